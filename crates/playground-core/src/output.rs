//! Append-only output sink and terminal adapter.
//!
//! The controller never talks to a terminal widget directly. It writes to an
//! `OutputSink`; the `TerminalAdapter` implementation forwards to whatever
//! `TerminalWidget` is attached and buffers everything written before the
//! widget exists, so output produced while the UI is still mounting is not lost.

use std::sync::{Arc, Mutex, MutexGuard};

pub trait OutputSink: Send {
    /// Prepares the sink for a new run. Idempotent.
    fn reset(&mut self);
    fn write_line(&mut self, text: &str);
    fn write_raw(&mut self, text: &str);
    /// Drops all visible output. Idempotent.
    fn clear(&mut self);
}

/// The concrete display the adapter drives (a terminal emulator, stdout, a test double).
pub trait TerminalWidget: Send {
    fn write_raw(&mut self, text: &str);
    fn write_line(&mut self, text: &str);
    fn clear(&mut self);
}

/// ANSI styling for banners and stderr text.
pub mod ansi {
    use crossterm::style::Stylize;

    pub const RESET: &str = "\x1b[0m";

    pub fn success(text: &str) -> String {
        format!("{}", text.green().bold())
    }

    pub fn failure(text: &str) -> String {
        format!("{}", text.red().bold())
    }

    pub fn stderr(text: &str) -> String {
        format!("{}", text.red())
    }

    pub fn header(text: &str) -> String {
        format!("{}", text.dim())
    }

    pub fn notice(text: &str) -> String {
        format!("{}", text.yellow())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingWrite {
    Line(String),
    Raw(String),
}

/// `OutputSink` over an optional `TerminalWidget`.
#[derive(Default)]
pub struct TerminalAdapter {
    widget: Option<Box<dyn TerminalWidget>>,
    pending: Vec<PendingWrite>,
    transcript: String,
}

impl TerminalAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a widget and replays everything written while detached.
    pub fn attach(&mut self, mut widget: Box<dyn TerminalWidget>) {
        for write in self.pending.drain(..) {
            match write {
                PendingWrite::Line(text) => widget.write_line(&text),
                PendingWrite::Raw(text) => widget.write_raw(&text),
            }
        }
        self.widget = Some(widget);
    }

    /// Detaches the current widget; later writes are buffered again.
    pub fn detach(&mut self) -> Option<Box<dyn TerminalWidget>> {
        self.widget.take()
    }

    pub fn is_attached(&self) -> bool {
        self.widget.is_some()
    }

    /// Everything written since the last `reset`/`clear`, ANSI sequences included.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl OutputSink for TerminalAdapter {
    fn reset(&mut self) {
        self.clear();
        if let Some(widget) = self.widget.as_mut() {
            widget.write_raw(ansi::RESET);
        }
    }

    fn write_line(&mut self, text: &str) {
        self.transcript.push_str(text);
        self.transcript.push('\n');
        match self.widget.as_mut() {
            Some(widget) => widget.write_line(text),
            None => self.pending.push(PendingWrite::Line(text.to_string())),
        }
    }

    fn write_raw(&mut self, text: &str) {
        self.transcript.push_str(text);
        match self.widget.as_mut() {
            Some(widget) => widget.write_raw(text),
            None => self.pending.push(PendingWrite::Raw(text.to_string())),
        }
    }

    fn clear(&mut self) {
        self.transcript.clear();
        self.pending.clear();
        if let Some(widget) = self.widget.as_mut() {
            widget.clear();
        }
    }
}

/// Cloneable handle the controller and strategies write through.
///
/// The lock is taken per call and never held across an await point.
#[derive(Clone)]
pub struct SinkHandle {
    inner: Arc<Mutex<dyn OutputSink>>,
}

impl SinkHandle {
    pub fn new<S: OutputSink + 'static>(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Wraps a sink the caller keeps its own typed reference to.
    pub fn from_shared<S: OutputSink + 'static>(sink: Arc<Mutex<S>>) -> Self {
        Self { inner: sink }
    }

    fn lock(&self) -> MutexGuard<'_, dyn OutputSink + 'static> {
        // A panic while writing leaves the text state usable
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn write_line(&self, text: &str) {
        self.lock().write_line(text);
    }

    pub fn write_raw(&self, text: &str) {
        self.lock().write_raw(text);
    }

    pub fn write_stderr_line(&self, text: &str) {
        self.lock().write_line(&ansi::stderr(text));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Splits streamed chunks into lines and forwards complete lines to a sink.
#[derive(Debug)]
pub struct LineBuffer {
    stream: Stream,
    partial: String,
    collected: String,
}

impl LineBuffer {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            partial: String::new(),
            collected: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &str, sink: &SinkHandle) {
        self.collected.push_str(chunk);
        self.partial.push_str(chunk);
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            self.emit(line, sink);
        }
    }

    /// Flushes a trailing unterminated line and returns everything pushed.
    pub fn finish(mut self, sink: &SinkHandle) -> String {
        if !self.partial.is_empty() {
            let rest = std::mem::take(&mut self.partial);
            self.emit(&rest, sink);
        }
        self.collected
    }

    fn emit(&self, line: &str, sink: &SinkHandle) {
        match self.stream {
            Stream::Stdout => sink.write_line(line),
            Stream::Stderr => sink.write_stderr_line(line),
        }
    }
}
