use async_trait::async_trait;
use playground_core::errors::{InterpreterFault, LoadError};
use playground_core::output::OutputSink;
use playground_core::preview::FilePreviewSurface;
use playground_core::registry::LanguageDescriptor;
use playground_core::runtime::{Interpreter, InterpreterExit, InterpreterProvider, OutputChunk};
use playground_core::session::FileSessionStorage;
use playground_core::{
    ConfigLoader, FailureKind, LanguageId, Playground, RunRejection, SinkHandle, TerminalAdapter,
    TerminalWidget,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Echoes each source line back on stdout.
struct EchoInterpreter;

#[async_trait]
impl Interpreter for EchoInterpreter {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(
        &self,
        source: &str,
        output: mpsc::UnboundedSender<OutputChunk>,
    ) -> Result<InterpreterExit, InterpreterFault> {
        if source.contains("raise") {
            return Err(InterpreterFault("Traceback: raised on purpose".to_string()));
        }
        // Deliberately split mid-line to exercise line buffering
        for chunk in source.as_bytes().chunks(3) {
            let _ = output.send(OutputChunk::stdout(String::from_utf8_lossy(chunk)));
        }
        Ok(InterpreterExit::default())
    }
}

struct EchoProvider;

#[async_trait]
impl InterpreterProvider for EchoProvider {
    async fn acquire(
        &self,
        _descriptor: &LanguageDescriptor,
    ) -> Result<Arc<dyn Interpreter>, LoadError> {
        Ok(Arc::new(EchoInterpreter))
    }
}

#[derive(Clone, Default)]
struct CapturedWidget {
    lines: Arc<Mutex<Vec<String>>>,
}

impl TerminalWidget for CapturedWidget {
    fn write_raw(&mut self, _text: &str) {}

    fn write_line(&mut self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }

    fn clear(&mut self) {
        self.lines.lock().unwrap().clear();
    }
}

fn build(dir: &std::path::Path, adapter: Arc<Mutex<TerminalAdapter>>) -> Playground {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = ConfigLoader::from_str("history:\n  capacity: 3\nsession:\n  autosave_delay_ms: 50\n").unwrap();
    Playground::builder(config)
        .interpreter_provider(Arc::new(EchoProvider))
        .preview_surface(Arc::new(FilePreviewSurface::new(dir.join("preview"))))
        .session_storage(Arc::new(FileSessionStorage::new(dir.join("session"))))
        .sink(SinkHandle::from_shared(adapter))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_output_written_before_attach_is_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = Arc::new(Mutex::new(TerminalAdapter::new()));
    let playground = build(dir.path(), adapter.clone());

    playground.set_source("console.log('early')");
    let result = playground.run().await.unwrap();
    assert!(result.succeeded);
    assert_eq!(result.stdout, "early");
    assert!(adapter.lock().unwrap().transcript().contains("early\n"));

    let widget = CapturedWidget::default();
    adapter.lock().unwrap().attach(Box::new(widget.clone()));
    assert!(widget.lines.lock().unwrap().iter().any(|l| l == "early"));
    assert_eq!(adapter.lock().unwrap().pending_len(), 0);
}

#[tokio::test]
async fn test_each_strategy_through_one_playground() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = Arc::new(Mutex::new(TerminalAdapter::new()));
    let playground = build(dir.path(), adapter.clone());

    // Wasm is refused until selected (which loads it)
    assert_eq!(
        playground.run_source(LanguageId::Python, "hi").await.unwrap_err(),
        RunRejection::RuntimeNotReady(LanguageId::Python)
    );
    playground.select_language(LanguageId::Python).await.unwrap();
    playground.set_source("first line\nsecond line\n");
    let result = playground.run().await.unwrap();
    assert!(result.succeeded);
    assert_eq!(result.stdout, "first line\nsecond line\n");
    let transcript = adapter.lock().unwrap().transcript().to_string();
    let first = transcript.find("first line\n").unwrap();
    let second = transcript.find("second line\n").unwrap();
    assert!(first < second);

    let raised = playground.run_source(LanguageId::Python, "raise").await.unwrap();
    assert!(!raised.succeeded);
    assert_eq!(raised.failure, Some(FailureKind::InterpreterFault));

    let preview = playground.run_source(LanguageId::Html, "<p>hello</p>").await.unwrap();
    assert!(preview.succeeded);
    let page = std::fs::read_to_string(preview.artifact.unwrap().location.unwrap()).unwrap();
    assert!(page.contains("sandbox=\"allow-scripts\""));

    let local = playground
        .run_source(LanguageId::Javascript, "throw new Error('boom')")
        .await
        .unwrap();
    assert!(local.stderr.contains("boom"));

    // History capacity comes from the config
    let history = playground.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].language, "Python");
    assert_eq!(history[2].language, "JavaScript");
}

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = build(dir.path(), Arc::new(Mutex::new(TerminalAdapter::new())));
    first.select_language(LanguageId::Rust).await.unwrap();
    first.set_source("fn main() { println!(\"saved\"); }");
    first.shutdown().await;
    drop(first);

    let second = build(dir.path(), Arc::new(Mutex::new(TerminalAdapter::new())));
    let record = second.restore().await.unwrap();
    assert_eq!(record.language, "Rust");
    assert_eq!(second.active_language(), LanguageId::Rust);
    assert_eq!(second.source(), "fn main() { println!(\"saved\"); }");

    second.clear_session().await;
    assert!(second.saved_session().await.is_none());
}

#[tokio::test]
async fn test_reset_and_clear_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = Arc::new(Mutex::new(TerminalAdapter::new()));
    let playground = build(dir.path(), adapter.clone());
    playground.run_source(LanguageId::Javascript, "console.log(1)").await.unwrap();

    let mut sink = adapter.lock().unwrap();
    sink.clear();
    sink.clear();
    assert_eq!(sink.transcript(), "");
    sink.reset();
    sink.reset();
    assert_eq!(sink.transcript(), "");
    assert_eq!(sink.pending_len(), 0);
}
