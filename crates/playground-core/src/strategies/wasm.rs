//! Runs program text in a preloaded WASI interpreter.
//!
//! Both output streams are split into lines as chunks arrive, so a program's
//! stdout and stderr reach the sink in the order it wrote them.

use super::{ExecutionRequest, ExecutionStrategy, FailureKind, StrategyOutput};
use crate::errors::ExecutionFault;
use crate::output::{LineBuffer, SinkHandle, Stream};
use crate::registry::LanguageDescriptor;
use crate::runtime::{OutputChunk, RuntimeLoader};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct WasmStrategy {
    loader: Arc<RuntimeLoader>,
}

impl WasmStrategy {
    pub fn new(loader: Arc<RuntimeLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl ExecutionStrategy for WasmStrategy {
    async fn execute(
        &self,
        descriptor: &LanguageDescriptor,
        request: &ExecutionRequest,
        sink: &SinkHandle,
    ) -> Result<StrategyOutput, ExecutionFault> {
        // Never loads here: the controller refuses runs for runtimes that are not ready
        let handle = self
            .loader
            .ready_handle(descriptor.id)
            .ok_or(ExecutionFault::RuntimeNotReady(descriptor.id))?;
        let interpreter = Arc::clone(handle.interpreter());

        let (tx, mut rx) = mpsc::unbounded_channel::<OutputChunk>();
        let run = interpreter.run(&request.source, tx);
        let drain = async {
            let mut stdout = LineBuffer::new(Stream::Stdout);
            let mut stderr = LineBuffer::new(Stream::Stderr);
            while let Some(chunk) = rx.recv().await {
                match chunk.stream {
                    Stream::Stdout => stdout.push(&chunk.text, sink),
                    Stream::Stderr => stderr.push(&chunk.text, sink),
                }
            }
            (stdout, stderr)
        };
        let (outcome, (stdout, stderr)) = tokio::join!(run, drain);
        let stdout = stdout.finish(sink);
        let mut stderr = stderr.finish(sink);

        match outcome {
            Ok(exit) => Ok(StrategyOutput {
                succeeded: exit.exit_code == 0,
                stdout,
                stderr,
                exit_code: Some(exit.exit_code),
                failure: None,
                artifact: None,
            }),
            Err(fault) => {
                log::debug!("{} raised: {}", interpreter.name(), fault);
                sink.write_stderr_line(&fault.0);
                if !stderr.is_empty() && !stderr.ends_with('\n') {
                    stderr.push('\n');
                }
                stderr.push_str(&fault.0);
                Ok(StrategyOutput {
                    succeeded: false,
                    stdout,
                    stderr,
                    exit_code: None,
                    failure: Some(FailureKind::InterpreterFault),
                    artifact: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LanguageId, Registry};
    use crate::test_utils::fake_interpreter::{FakeInterpreterProvider, ProviderBehavior};
    use crate::test_utils::recording_sink::RecordingSink;

    async fn ready_strategy() -> WasmStrategy {
        let provider = Arc::new(FakeInterpreterProvider::new(ProviderBehavior::Succeed));
        let loader = Arc::new(RuntimeLoader::new(Registry::new(), provider));
        loader.ensure_ready(LanguageId::Python).await.unwrap();
        WasmStrategy::new(loader)
    }

    async fn run_python(strategy: &WasmStrategy, source: &str) -> (Result<StrategyOutput, ExecutionFault>, RecordingSink) {
        let recorder = RecordingSink::new();
        let sink = SinkHandle::new(recorder.clone());
        let descriptor = Registry::new().describe(LanguageId::Python);
        let request = ExecutionRequest::new(LanguageId::Python, source);
        (strategy.execute(descriptor, &request, &sink).await, recorder)
    }

    #[tokio::test]
    async fn test_stdout_is_streamed_line_by_line() {
        let strategy = ready_strategy().await;
        let (output, recorder) = run_python(&strategy, "out:Hello\nout:World").await;
        let output = output.unwrap();

        assert!(output.succeeded);
        assert_eq!(output.stdout, "Hello\nWorld\n");
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(recorder.lines(), vec!["Hello".to_string(), "World".to_string()]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unsuccessful_without_fault() {
        let strategy = ready_strategy().await;
        let (output, _) = run_python(&strategy, "err:Traceback\nexit:1").await;
        let output = output.unwrap();

        assert!(!output.succeeded);
        assert_eq!(output.exit_code, Some(1));
        assert_eq!(output.stderr, "Traceback\n");
        assert!(output.failure.is_none());
    }

    #[tokio::test]
    async fn test_raised_fault_keeps_prior_output() {
        let strategy = ready_strategy().await;
        let (output, recorder) = run_python(&strategy, "out:before\nraise:ZeroDivisionError").await;
        let output = output.unwrap();

        assert!(!output.succeeded);
        assert_eq!(output.failure, Some(FailureKind::InterpreterFault));
        assert_eq!(output.stdout, "before\n");
        assert!(output.stderr.contains("ZeroDivisionError"));
        let lines = recorder.lines();
        assert_eq!(lines[0], "before");
        assert!(lines[1].contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_unloaded_runtime_is_refused() {
        let provider = Arc::new(FakeInterpreterProvider::new(ProviderBehavior::Succeed));
        let loader = Arc::new(RuntimeLoader::new(Registry::new(), provider.clone()));
        let strategy = WasmStrategy::new(loader);

        let (output, recorder) = run_python(&strategy, "out:x").await;
        assert!(matches!(output, Err(ExecutionFault::RuntimeNotReady(LanguageId::Python))));
        assert!(recorder.events().is_empty());
        assert_eq!(provider.acquisitions(), 0);
    }

    #[tokio::test]
    async fn test_stderr_keeps_its_place_between_stdout_lines() {
        let strategy = ready_strategy().await;
        let (output, recorder) =
            run_python(&strategy, "out:first\nerr:warning\nout:second\nraise:ValueError").await;
        let output = output.unwrap();

        assert_eq!(output.stdout, "first\nsecond\n");
        assert_eq!(output.stderr, "warning\nValueError");
        let lines = recorder.lines();
        assert_eq!(lines[0], "first");
        assert!(lines[1].contains("warning"));
        assert_eq!(lines[2], "second");
        assert!(lines[3].contains("ValueError"));
    }
}
