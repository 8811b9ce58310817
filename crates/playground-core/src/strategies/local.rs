//! In-process JavaScript evaluation.
//!
//! The program text becomes the body of a function compiled with
//! `new Function`, called with a `console` object that records output instead
//! of printing it. Each run gets a fresh engine context on a blocking worker
//! thread. Nothing here can interrupt a script that never returns; the
//! optional engine loop and recursion limits are the only brake.

use super::{ExecutionRequest, ExecutionStrategy, FailureKind, StrategyOutput};
use crate::config::LocalConfig;
use crate::errors::ExecutionFault;
use crate::output::SinkHandle;
use crate::registry::LanguageDescriptor;
use async_trait::async_trait;
use boa_engine::{context::ContextBuilder, Source};
use serde::Deserialize;

const REPORT_EXPR: &str =
    "JSON.stringify({ output: __playgroundOutput, fault: __playgroundFault })";

#[derive(Debug, Deserialize, Default)]
struct HarnessReport {
    output: Vec<(String, String)>,
    fault: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleStream {
    Out,
    Err,
}

#[derive(Debug, Default)]
struct LocalRun {
    entries: Vec<(ConsoleStream, String)>,
    fault: Option<String>,
}

fn build_harness(source: &str) -> String {
    // serde_json produces a valid JS string literal for any input
    let literal = serde_json::to_string(source).unwrap_or_else(|_| "\"\"".into());
    format!(
        r#"var __playgroundOutput = [];
var __playgroundFault = null;
(function () {{
  const format = (value) => {{
    if (typeof value === "string") return value;
    if (value instanceof Error) return String(value);
    if (value === undefined) return "undefined";
    if (typeof value === "function") return value.toString();
    try {{
      const json = JSON.stringify(value);
      return json === undefined ? String(value) : json;
    }} catch (_) {{
      return String(value);
    }}
  }};
  const capture = (stream) => (...args) => {{
    __playgroundOutput.push([stream, args.map(format).join(" ")]);
  }};
  const console = {{
    log: capture("out"),
    info: capture("out"),
    debug: capture("out"),
    warn: capture("err"),
    error: capture("err"),
  }};
  globalThis.console = console;
  try {{
    const body = new Function("console", {literal});
    body(console);
  }} catch (e) {{
    __playgroundFault = String(e);
  }}
}})();"#
    )
}

fn evaluate(source: &str, limits: &LocalConfig) -> LocalRun {
    let mut context = match ContextBuilder::new().build() {
        Ok(context) => context,
        Err(err) => {
            return LocalRun {
                entries: Vec::new(),
                fault: Some(format!("failed to construct JS context: {}", err)),
            }
        }
    };

    let mut runtime_limits = context.runtime_limits();
    if let Some(limit) = limits.loop_iteration_limit {
        runtime_limits.set_loop_iteration_limit(limit);
    }
    if let Some(limit) = limits.recursion_limit {
        runtime_limits.set_recursion_limit(limit);
    }
    context.set_runtime_limits(runtime_limits);

    let harness = build_harness(source);
    // Engine limit errors cannot be caught by the script, so they surface here
    let engine_fault = context
        .eval(Source::from_bytes(harness.as_bytes()))
        .err()
        .map(|err| err.to_string());

    let report = context
        .eval(Source::from_bytes(REPORT_EXPR.as_bytes()))
        .ok()
        .and_then(|value| value.as_string().map(|s| s.to_std_string_escaped()))
        .and_then(|json| serde_json::from_str::<HarnessReport>(&json).ok())
        .unwrap_or_default();

    let entries = report
        .output
        .into_iter()
        .map(|(stream, text)| {
            let stream = if stream == "err" {
                ConsoleStream::Err
            } else {
                ConsoleStream::Out
            };
            (stream, text)
        })
        .collect();

    LocalRun {
        entries,
        fault: report.fault.or(engine_fault),
    }
}

pub struct LocalStrategy {
    limits: LocalConfig,
}

impl LocalStrategy {
    pub fn new(limits: LocalConfig) -> Self {
        Self { limits }
    }
}

impl Default for LocalStrategy {
    fn default() -> Self {
        Self::new(LocalConfig::default())
    }
}

#[async_trait]
impl ExecutionStrategy for LocalStrategy {
    async fn execute(
        &self,
        _descriptor: &LanguageDescriptor,
        request: &ExecutionRequest,
        sink: &SinkHandle,
    ) -> Result<StrategyOutput, ExecutionFault> {
        let source = request.source.clone();
        let limits = self.limits.clone();
        let run = tokio::task::spawn_blocking(move || evaluate(&source, &limits)).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        for (stream, text) in &run.entries {
            for line in text.split('\n') {
                match stream {
                    ConsoleStream::Out => sink.write_line(line),
                    ConsoleStream::Err => sink.write_stderr_line(line),
                }
            }
            match stream {
                ConsoleStream::Out => stdout.push(text.as_str()),
                ConsoleStream::Err => stderr.push(text.as_str()),
            }
        }

        let mut output = StrategyOutput {
            succeeded: run.fault.is_none(),
            stdout: stdout.join("\n"),
            exit_code: None,
            ..Default::default()
        };

        if let Some(fault) = &run.fault {
            log::debug!("Local evaluation raised: {}", fault);
            sink.write_stderr_line(fault);
            stderr.push(fault.as_str());
            output.failure = Some(FailureKind::LocalExecutionFault);
        }
        output.stderr = stderr.join("\n");

        Ok(output)
    }
}
