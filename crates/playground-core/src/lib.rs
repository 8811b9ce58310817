//! Core of a multi-language code playground.
//!
//! A user picks a language, edits source text and runs it. Each language is
//! bound to exactly one way of running code, and this crate hides the
//! differences behind a single run call that always produces one normalized
//! result.
//!
//! # Architecture Overview
//!
//! - **Registry**: the fixed table of languages and the strategy each uses
//! - **Runtime loading**: single-flight acquisition of WASI interpreters
//! - **Execution control**: the one-run-at-a-time state machine and dispatch
//! - **Strategies**: in-process JavaScript, WASI interpreter, remote HTTP
//!   service and sandboxed markup preview
//! - **Output**: an append-only sink that buffers until a terminal attaches
//! - **Session and history**: debounced persistence of the editor buffer and a
//!   bounded record of recent runs
//! - **Configuration**: YAML settings with environment overrides

pub mod config;
pub mod controller;
pub mod errors;
pub mod history;
pub mod output;
pub mod playground;
pub mod preview;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod strategies;

pub use config::*;
pub use controller::{ControllerState, ExecutionController, RunResult};
pub use errors::{ExecutionFault, PlaygroundError, RunRejection};
pub use history::{ExecutionHistory, HistoryEntry};
pub use output::{OutputSink, SinkHandle, TerminalAdapter, TerminalWidget};
pub use playground::{Playground, PlaygroundBuilder};
pub use registry::{LanguageDescriptor, LanguageId, Registry, StrategyKind};
pub use runtime::{RuntimeLoader, RuntimeState};
pub use session::{SessionRecord, SessionStore};
pub use strategies::FailureKind;

#[cfg(test)]
pub mod test_utils;
