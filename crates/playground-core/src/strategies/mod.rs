//! Execution strategies, one per way a language can be run.
//!
//! Each strategy receives the same `ExecutionRequest` and the shared output
//! sink, streams whatever it produces into the sink in order, and reports a
//! `StrategyOutput`. Failures a strategy can attribute to user code (a thrown
//! exception, a nonzero exit) are reported inside the output; failures of the
//! strategy itself (network, malformed service replies) come back as
//! `ExecutionFault` and are folded into a failed result by the controller.

use crate::errors::ExecutionFault;
use crate::output::SinkHandle;
use crate::preview::PreviewArtifact;
use crate::registry::{LanguageDescriptor, LanguageId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod local;
pub mod preview;
pub mod remote;
pub mod wasm;

pub use local::LocalStrategy;
pub use preview::PreviewStrategy;
pub use remote::RemoteStrategy;
pub use wasm::WasmStrategy;

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub language: LanguageId,
    pub source: String,
    pub requested_at: DateTime<Utc>,
}

impl ExecutionRequest {
    pub fn new(language: LanguageId, source: impl Into<String>) -> Self {
        Self {
            language,
            source: source.into(),
            requested_at: Utc::now(),
        }
    }
}

/// Why a run failed, when it failed for a reason other than its exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    LocalExecutionFault,
    InterpreterFault,
    ServiceError,
    ExecutionRejected,
    RuntimeNotReady,
    PreviewFailed,
    WorkerFailed,
}

impl FailureKind {
    pub fn from_fault(fault: &ExecutionFault) -> Self {
        match fault {
            ExecutionFault::ServiceError(_) => FailureKind::ServiceError,
            ExecutionFault::ExecutionRejected(_) => FailureKind::ExecutionRejected,
            ExecutionFault::RuntimeNotReady(_) => FailureKind::RuntimeNotReady,
            ExecutionFault::Preview(_) => FailureKind::PreviewFailed,
            ExecutionFault::WorkerFailed(_) => FailureKind::WorkerFailed,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrategyOutput {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureKind>,
    pub artifact: Option<PreviewArtifact>,
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    async fn execute(
        &self,
        descriptor: &LanguageDescriptor,
        request: &ExecutionRequest,
        sink: &SinkHandle,
    ) -> Result<StrategyOutput, ExecutionFault>;
}
