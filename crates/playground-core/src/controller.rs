//! The run state machine.
//!
//! `ExecutionController::run` is the only way code gets executed. It admits one
//! run at a time, refuses Wasm runs whose runtime is not loaded yet, dispatches
//! to the strategy the registry names for the language, and always ends with a
//! `RunResult` and a history entry. Strategy faults never escape `run`.

use crate::errors::{ExecutionFault, RunRejection};
use crate::history::{ExecutionHistory, HistoryEntry};
use crate::output::{ansi, SinkHandle};
use crate::preview::PreviewArtifact;
use crate::registry::{LanguageDescriptor, LanguageId, Registry, StrategyKind};
use crate::runtime::{RuntimeLoader, RuntimeState};
use crate::strategies::{ExecutionRequest, ExecutionStrategy, FailureKind, StrategyOutput};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
}

/// Normalized outcome of one run, whatever strategy produced it.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub language: LanguageId,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureKind>,
    pub artifact: Option<PreviewArtifact>,
}

/// One strategy per kind.
#[derive(Clone)]
pub struct StrategySet {
    pub local: Arc<dyn ExecutionStrategy>,
    pub wasm: Arc<dyn ExecutionStrategy>,
    pub remote: Arc<dyn ExecutionStrategy>,
    pub preview: Arc<dyn ExecutionStrategy>,
}

impl StrategySet {
    pub fn for_kind(&self, kind: StrategyKind) -> &Arc<dyn ExecutionStrategy> {
        match kind {
            StrategyKind::Local => &self.local,
            StrategyKind::Wasm => &self.wasm,
            StrategyKind::Remote => &self.remote,
            StrategyKind::Preview => &self.preview,
        }
    }
}

/// Holds `Running` for the lifetime of a run and restores `Idle` on drop,
/// including when the run future is dropped mid-flight.
struct RunGuard<'a> {
    state: &'a Mutex<ControllerState>,
}

impl<'a> RunGuard<'a> {
    fn acquire(state: &'a Mutex<ControllerState>) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current == ControllerState::Running {
            return None;
        }
        *current = ControllerState::Running;
        Some(Self { state })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = ControllerState::Idle;
    }
}

pub struct ExecutionController {
    registry: Registry,
    loader: Arc<RuntimeLoader>,
    strategies: StrategySet,
    sink: SinkHandle,
    history: Arc<ExecutionHistory>,
    state: Mutex<ControllerState>,
}

impl ExecutionController {
    pub fn new(
        registry: Registry,
        loader: Arc<RuntimeLoader>,
        strategies: StrategySet,
        sink: SinkHandle,
        history: Arc<ExecutionHistory>,
    ) -> Self {
        Self {
            registry,
            loader,
            strategies,
            sink,
            history,
            state: Mutex::new(ControllerState::Idle),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    pub fn sink(&self) -> &SinkHandle {
        &self.sink
    }

    pub fn history(&self) -> &Arc<ExecutionHistory> {
        &self.history
    }

    pub async fn run(&self, language: LanguageId, source: &str) -> Result<RunResult, RunRejection> {
        let _guard = RunGuard::acquire(&self.state).ok_or_else(|| {
            log::debug!("Ignoring {} run request while another run is in progress", language);
            RunRejection::AlreadyRunning
        })?;

        let descriptor = self.registry.describe(language);
        if descriptor.strategy.kind() == StrategyKind::Wasm {
            self.check_runtime(language)?;
        }

        let request = ExecutionRequest::new(language, source);
        let started = Instant::now();
        self.sink.reset();
        self.sink
            .write_line(&ansi::header(&format!("Running {}...", descriptor.display_name)));

        log::info!("Running {} via {} strategy", descriptor.display_name, descriptor.strategy.kind());
        let outcome = self
            .strategies
            .for_kind(descriptor.strategy.kind())
            .execute(descriptor, &request, &self.sink)
            .await;
        let output = match outcome {
            Ok(output) => output,
            Err(fault) => self.fold_fault(descriptor, fault),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        self.write_banner(&output, duration_ms);

        let result = RunResult {
            language,
            started_at: request.requested_at,
            duration_ms,
            succeeded: output.succeeded,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            failure: output.failure,
            artifact: output.artifact,
        };

        self.history.record(HistoryEntry {
            language: descriptor.display_name.to_string(),
            timestamp: result.started_at,
            succeeded: result.succeeded,
            duration_ms,
        });

        Ok(result)
    }

    fn check_runtime(&self, language: LanguageId) -> Result<(), RunRejection> {
        match self.loader.state(language) {
            RuntimeState::Ready => Ok(()),
            RuntimeState::Failed(message) => Err(RunRejection::RuntimeLoadFailed { language, message }),
            RuntimeState::Unloaded | RuntimeState::Loading => Err(RunRejection::RuntimeNotReady(language)),
        }
    }

    fn fold_fault(&self, descriptor: &LanguageDescriptor, fault: ExecutionFault) -> StrategyOutput {
        log::warn!("{} run failed: {}", descriptor.display_name, fault);
        let message = fault.to_string();
        self.sink.write_stderr_line(&message);
        StrategyOutput {
            succeeded: false,
            stderr: message,
            failure: Some(FailureKind::from_fault(&fault)),
            ..Default::default()
        }
    }

    fn write_banner(&self, output: &StrategyOutput, duration_ms: u64) {
        let banner = if output.succeeded {
            ansi::success(&format!("Finished in {} ms", duration_ms))
        } else {
            match output.exit_code {
                Some(code) => ansi::failure(&format!("Failed with exit code {} after {} ms", code, duration_ms)),
                None => ansi::failure(&format!("Failed after {} ms", duration_ms)),
            }
        };
        self.sink.write_line(&banner);
    }
}
