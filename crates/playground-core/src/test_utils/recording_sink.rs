// src/test_utils/recording_sink.rs
use std::sync::{Arc, Mutex};

use crate::output::OutputSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Reset,
    Clear,
    Line(String),
    Raw(String),
}

/// Sink that records every call in order.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Line(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn reset(&mut self) {
        self.events.lock().unwrap().push(SinkEvent::Reset);
    }

    fn write_line(&mut self, text: &str) {
        self.events.lock().unwrap().push(SinkEvent::Line(text.to_string()));
    }

    fn write_raw(&mut self, text: &str) {
        self.events.lock().unwrap().push(SinkEvent::Raw(text.to_string()));
    }

    fn clear(&mut self) {
        self.events.lock().unwrap().push(SinkEvent::Clear);
    }
}
