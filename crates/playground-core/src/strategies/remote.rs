//! Remote execution through a Piston-compatible HTTP service.
//!
//! The request names the service's language and version and carries the
//! program as a single file. A reply with a `run` stage is a completed run
//! regardless of its exit code. A reply with only a `message` is the service
//! refusing the request. Compiled languages may also report a `compile` stage;
//! when compilation fails the service omits `run`.

use super::{ExecutionRequest, ExecutionStrategy, StrategyOutput};
use crate::config::RemoteConfig;
use crate::errors::ExecutionFault;
use crate::output::SinkHandle;
use crate::registry::{LanguageDescriptor, Strategy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<FileContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub compile: Option<StageResult>,
    #[serde(default)]
    pub run: Option<StageResult>,
    #[serde(default)]
    pub message: Option<String>,
}

pub struct RemoteStrategy {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteStrategy {
    pub fn new(config: &RemoteConfig) -> Result<Self, ExecutionFault> {
        let mut builder = reqwest::Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn submit(&self, payload: &ExecuteRequest) -> Result<ExecuteResponse, ExecutionFault> {
        log::debug!(
            "Submitting {} {} program to {}",
            payload.language,
            payload.version,
            self.endpoint
        );
        let response = self.client.post(&self.endpoint).json(payload).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ExecuteResponse>(&body)
                .ok()
                .and_then(|reply| reply.message)
                .unwrap_or(body);
            return Err(ExecutionFault::ServiceError(format!("HTTP {}: {}", status, detail)));
        }

        serde_json::from_str(&body).map_err(|e| {
            ExecutionFault::ExecutionRejected(format!("Unreadable service reply: {}", e))
        })
    }
}

fn write_stage(stage: &StageResult, sink: &SinkHandle) {
    for line in stage.stdout.lines() {
        sink.write_line(line);
    }
    for line in stage.stderr.lines() {
        sink.write_stderr_line(line);
    }
}

#[async_trait]
impl ExecutionStrategy for RemoteStrategy {
    async fn execute(
        &self,
        descriptor: &LanguageDescriptor,
        request: &ExecutionRequest,
        sink: &SinkHandle,
    ) -> Result<StrategyOutput, ExecutionFault> {
        let (language, version) = match descriptor.strategy {
            Strategy::Remote { language, version } => (language, version),
            other => {
                return Err(ExecutionFault::ExecutionRejected(format!(
                    "{} is not a remote language ({})",
                    descriptor.display_name,
                    other.kind()
                )))
            }
        };

        let payload = ExecuteRequest {
            language: language.to_string(),
            version: version.to_string(),
            files: vec![FileContent {
                content: request.source.clone(),
            }],
        };
        let reply = self.submit(&payload).await?;

        if let Some(compile) = reply.compile.as_ref().filter(|c| c.code.unwrap_or(0) != 0) {
            if reply.run.is_none() {
                write_stage(compile, sink);
                return Ok(StrategyOutput {
                    succeeded: false,
                    stdout: compile.stdout.clone(),
                    stderr: compile.stderr.clone(),
                    exit_code: compile.code,
                    ..Default::default()
                });
            }
        }

        let run = match reply.run {
            Some(run) => run,
            None => {
                let message = reply
                    .message
                    .unwrap_or_else(|| "Service reply has no run result".to_string());
                return Err(ExecutionFault::ExecutionRejected(message));
            }
        };

        write_stage(&run, sink);
        if let Some(signal) = &run.signal {
            sink.write_stderr_line(&format!("Process terminated by {}", signal));
        }

        Ok(StrategyOutput {
            succeeded: run.code == Some(0),
            stdout: run.stdout,
            stderr: run.stderr,
            exit_code: run.code,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LanguageId, Registry};
    use crate::test_utils::mock_execution_server::{MockExecutionServer, MockReply};
    use crate::test_utils::recording_sink::RecordingSink;
    use serde_json::json;

    fn strategy_for(server: &MockExecutionServer) -> RemoteStrategy {
        RemoteStrategy::new(&RemoteConfig {
            endpoint: server.endpoint(),
            timeout_seconds: Some(5),
        })
        .unwrap()
    }

    async fn run_remote(
        strategy: &RemoteStrategy,
        language: LanguageId,
        source: &str,
    ) -> (Result<StrategyOutput, ExecutionFault>, RecordingSink) {
        let recorder = RecordingSink::new();
        let sink = SinkHandle::new(recorder.clone());
        let descriptor = Registry::new().describe(language);
        let request = ExecutionRequest::new(language, source);
        (strategy.execute(descriptor, &request, &sink).await, recorder)
    }

    #[tokio::test]
    async fn test_successful_run_sends_service_names() {
        let server = MockExecutionServer::start(vec![MockReply::ok(json!({
            "run": { "stdout": "Hello, World!\n", "stderr": "", "code": 0 }
        }))])
        .await;
        let strategy = strategy_for(&server);

        let (output, recorder) = run_remote(&strategy, LanguageId::Cpp, "int main() {}").await;
        let output = output.unwrap();
        assert!(output.succeeded);
        assert_eq!(output.stdout, "Hello, World!\n");
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(recorder.lines(), vec!["Hello, World!".to_string()]);

        let requests = server.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].language, "c++");
        assert_eq!(requests[0].version, "10.2.0");
        assert_eq!(requests[0].files[0].content, "int main() {}");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_a_completed_failed_run() {
        let server = MockExecutionServer::start(vec![MockReply::ok(json!({
            "run": { "stdout": "", "stderr": "panicked at main.rs\n", "code": 101 }
        }))])
        .await;
        let strategy = strategy_for(&server);

        let (output, _) = run_remote(&strategy, LanguageId::Rust, "fn main() { panic!() }").await;
        let output = output.unwrap();
        assert!(!output.succeeded);
        assert_eq!(output.exit_code, Some(101));
        assert!(output.failure.is_none());
        assert!(output.stderr.contains("panicked"));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_http_error_is_service_error() {
        let server = MockExecutionServer::start(vec![MockReply::status(
            500,
            json!({ "message": "internal failure" }),
        )])
        .await;
        let strategy = strategy_for(&server);

        let (output, recorder) = run_remote(&strategy, LanguageId::Go, "package main").await;
        match output {
            Err(ExecutionFault::ServiceError(message)) => {
                assert!(message.contains("500"));
                assert!(message.contains("internal failure"));
            }
            other => panic!("expected service error, got {:?}", other.map(|o| o.succeeded)),
        }
        assert!(recorder.events().is_empty());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_message_only_reply_is_rejection() {
        let server = MockExecutionServer::start(vec![MockReply::ok(json!({
            "message": "java-15.0.2 runtime is unknown"
        }))])
        .await;
        let strategy = strategy_for(&server);

        let (output, _) = run_remote(&strategy, LanguageId::Java, "class Main {}").await;
        match output {
            Err(ExecutionFault::ExecutionRejected(message)) => {
                assert!(message.contains("runtime is unknown"));
            }
            other => panic!("expected rejection, got {:?}", other.map(|o| o.succeeded)),
        }
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_compile_failure_without_run_stage() {
        let server = MockExecutionServer::start(vec![MockReply::ok(json!({
            "compile": { "stdout": "", "stderr": "error: expected ';'\n", "code": 1 }
        }))])
        .await;
        let strategy = strategy_for(&server);

        let (output, recorder) = run_remote(&strategy, LanguageId::C, "int main() { return 0 }").await;
        let output = output.unwrap();
        assert!(!output.succeeded);
        assert_eq!(output.exit_code, Some(1));
        assert!(output.stderr.contains("expected ';'"));
        assert_eq!(recorder.lines().len(), 1);
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_service_is_service_error() {
        let strategy = RemoteStrategy::new(&RemoteConfig {
            endpoint: "http://127.0.0.1:1/api/v2/execute".to_string(),
            timeout_seconds: Some(2),
        })
        .unwrap();

        let (output, _) = run_remote(&strategy, LanguageId::Typescript, "let x = 1").await;
        assert!(matches!(output, Err(ExecutionFault::ServiceError(_))));
    }

    #[tokio::test]
    async fn test_non_remote_descriptor_is_rejected() {
        let strategy = RemoteStrategy::new(&RemoteConfig::default()).unwrap();
        let (output, _) = run_remote(&strategy, LanguageId::Javascript, "1").await;
        assert!(matches!(output, Err(ExecutionFault::ExecutionRejected(_))));
    }
}
