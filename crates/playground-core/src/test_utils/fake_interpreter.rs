// src/test_utils/fake_interpreter.rs
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};

use crate::errors::{InterpreterFault, LoadError};
use crate::registry::LanguageDescriptor;
use crate::runtime::{Interpreter, InterpreterExit, InterpreterProvider, OutputChunk};

const OPEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBehavior {
    Succeed,
    Fail,
    /// Blocks every acquisition until `open_gate` is called.
    Gated,
}

pub struct FakeInterpreterProvider {
    behavior: Mutex<ProviderBehavior>,
    acquisitions: AtomicUsize,
    gate: Arc<Semaphore>,
    run_gate: Arc<Semaphore>,
}

impl FakeInterpreterProvider {
    pub fn new(behavior: ProviderBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            acquisitions: AtomicUsize::new(0),
            gate: Arc::new(Semaphore::new(0)),
            run_gate: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn set_behavior(&self, behavior: ProviderBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn open_gate(&self) {
        self.gate.add_permits(OPEN);
    }

    /// Releases interpreter runs parked on a `wait` line.
    pub fn release_runs(&self) {
        self.run_gate.add_permits(OPEN);
    }
}

#[async_trait]
impl InterpreterProvider for FakeInterpreterProvider {
    async fn acquire(
        &self,
        descriptor: &LanguageDescriptor,
    ) -> Result<Arc<dyn Interpreter>, LoadError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            ProviderBehavior::Succeed => {}
            ProviderBehavior::Fail => {
                return Err(LoadError::new(descriptor.id, "module host unreachable"));
            }
            ProviderBehavior::Gated => {
                let _permit = self
                    .gate
                    .acquire()
                    .await
                    .map_err(|e| LoadError::new(descriptor.id, e.to_string()))?;
            }
        }
        Ok(Arc::new(ScriptedInterpreter {
            run_gate: Arc::clone(&self.run_gate),
        }))
    }
}

/// Runs a tiny line-oriented script:
/// `out:<text>` prints a line, `err:<text>` writes stderr, `raise:<msg>` raises,
/// `exit:<n>` sets the exit code, `wait` parks until `release_runs`.
pub struct ScriptedInterpreter {
    run_gate: Arc<Semaphore>,
}

#[async_trait]
impl Interpreter for ScriptedInterpreter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(
        &self,
        source: &str,
        output: mpsc::UnboundedSender<OutputChunk>,
    ) -> Result<InterpreterExit, InterpreterFault> {
        let mut exit = InterpreterExit::default();
        for line in source.lines() {
            if let Some(text) = line.strip_prefix("out:") {
                let _ = output.send(OutputChunk::stdout(format!("{}\n", text)));
            } else if let Some(text) = line.strip_prefix("err:") {
                let _ = output.send(OutputChunk::stderr(format!("{}\n", text)));
            } else if let Some(message) = line.strip_prefix("raise:") {
                return Err(InterpreterFault(message.to_string()));
            } else if let Some(code) = line.strip_prefix("exit:") {
                exit.exit_code = code.trim().parse().unwrap_or(1);
            } else if line.trim() == "wait" {
                let _permit = self.run_gate.acquire().await;
            }
        }
        Ok(exit)
    }
}
