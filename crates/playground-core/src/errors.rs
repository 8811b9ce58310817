//! Error types for the playground orchestrator
//!
//! Errors are split by where they surface. `RunRejection` is returned when a
//! run request is refused at the controller's entry and nothing executed.
//! `ExecutionFault` is raised inside a strategy and is always converted into a
//! failed `RunResult` before it reaches the caller. `PlaygroundError` covers
//! everything around execution: configuration, storage and runtime loading.

use crate::registry::LanguageId;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PlaygroundError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Runtime for {language} failed to load: {message}")]
    RuntimeLoadFailed { language: LanguageId, message: String },
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for PlaygroundError {
    fn from(err: std::io::Error) -> Self {
        PlaygroundError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for PlaygroundError {
    fn from(err: serde_json::Error) -> Self {
        PlaygroundError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PlaygroundError {
    fn from(err: serde_yaml::Error) -> Self {
        PlaygroundError::ConfigError(err.to_string())
    }
}

impl From<LoadError> for PlaygroundError {
    fn from(err: LoadError) -> Self {
        PlaygroundError::RuntimeLoadFailed {
            language: err.language,
            message: err.message,
        }
    }
}

/// Reasons the controller refuses to start a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunRejection {
    #[error("A run is already in progress")]
    AlreadyRunning,
    #[error("The {0} runtime is not ready yet")]
    RuntimeNotReady(LanguageId),
    #[error("The {language} runtime failed to load: {message}")]
    RuntimeLoadFailed { language: LanguageId, message: String },
}

/// Failure of a one-time interpreter acquisition.
///
/// Cloned to every caller awaiting the same load, so it only carries text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to load {language} runtime: {message}")]
pub struct LoadError {
    pub language: LanguageId,
    pub message: String,
}

impl LoadError {
    pub fn new(language: LanguageId, message: impl Into<String>) -> Self {
        Self {
            language,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExecutionFault {
    #[error("Execution service error: {0}")]
    ServiceError(String),
    #[error("Execution rejected by service: {0}")]
    ExecutionRejected(String),
    #[error("Runtime not ready: {0}")]
    RuntimeNotReady(LanguageId),
    #[error("Preview failed: {0}")]
    Preview(#[from] PreviewError),
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

impl From<reqwest::Error> for ExecutionFault {
    fn from(err: reqwest::Error) -> Self {
        ExecutionFault::ServiceError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ExecutionFault {
    fn from(err: tokio::task::JoinError) -> Self {
        ExecutionFault::WorkerFailed(err.to_string())
    }
}

/// An exception raised by a loaded interpreter while running user code.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct InterpreterFault(pub String);

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("I/O error while writing preview: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Session record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Session storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown language '{0}'")]
pub struct LanguageParseError(pub String);
