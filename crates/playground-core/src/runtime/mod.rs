//! Heavyweight language runtimes provisioned on first use.
//!
//! A runtime is acquired through an `InterpreterProvider` (fetch + compile)
//! and then kept for the rest of the process behind a `RuntimeHandle`. The
//! `RuntimeLoader` owns the handles and guarantees a single acquisition per
//! language no matter how many callers ask for it concurrently.

use crate::errors::{InterpreterFault, LoadError};
use crate::output::Stream;
use crate::registry::{LanguageDescriptor, LanguageId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

pub mod loader;
pub mod wasi;

pub use loader::RuntimeLoader;
pub use wasi::{WasiInterpreter, WasiInterpreterProvider};

/// How an interpreter run ended when it did not raise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpreterExit {
    pub exit_code: i32,
}

/// A piece of program output tagged with the stream it was written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: Stream,
    pub text: String,
}

impl OutputChunk {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            text: text.into(),
        }
    }
}

/// A loaded interpreter that can run program text.
///
/// Standard output and standard error are streamed through `output` in the
/// order they were produced; chunks need not be line-aligned. The sender is
/// dropped when the run finishes, including when it raises.
#[async_trait]
pub trait Interpreter: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        source: &str,
        output: mpsc::UnboundedSender<OutputChunk>,
    ) -> Result<InterpreterExit, InterpreterFault>;
}

/// One-time acquisition of an interpreter for a language.
#[async_trait]
pub trait InterpreterProvider: Send + Sync {
    async fn acquire(
        &self,
        descriptor: &LanguageDescriptor,
    ) -> Result<Arc<dyn Interpreter>, LoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeState {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

pub struct RuntimeHandle {
    language: LanguageId,
    interpreter: Arc<dyn Interpreter>,
    loaded_at: DateTime<Utc>,
}

impl RuntimeHandle {
    pub fn new(language: LanguageId, interpreter: Arc<dyn Interpreter>) -> Self {
        Self {
            language,
            interpreter,
            loaded_at: Utc::now(),
        }
    }

    pub fn language(&self) -> LanguageId {
        self.language
    }

    pub fn interpreter(&self) -> &Arc<dyn Interpreter> {
        &self.interpreter
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("language", &self.language)
            .field("interpreter", &self.interpreter.name())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}
