//! The `Playground` wires every component together behind the operations an
//! editor UI needs: pick a language, edit its buffer, run it, restore the
//! previous session.

use crate::config::PlaygroundConfig;
use crate::controller::{ExecutionController, RunResult, StrategySet};
use crate::errors::{PlaygroundError, RunRejection};
use crate::history::{ExecutionHistory, HistoryEntry};
use crate::output::{SinkHandle, TerminalAdapter};
use crate::preview::{FilePreviewSurface, PreviewSurface};
use crate::registry::{LanguageDescriptor, LanguageId, Registry};
use crate::runtime::{InterpreterProvider, RuntimeHandle, RuntimeLoader, RuntimeState, WasiInterpreterProvider};
use crate::session::{Autosaver, FileSessionStorage, SessionRecord, SessionStorage, SessionStore};
use crate::strategies::{LocalStrategy, PreviewStrategy, RemoteStrategy, WasmStrategy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Builder for `Playground`. Every collaborator not supplied is created from
/// the configuration.
pub struct PlaygroundBuilder {
    config: PlaygroundConfig,
    provider: Option<Arc<dyn InterpreterProvider>>,
    surface: Option<Arc<dyn PreviewSurface>>,
    storage: Option<Arc<dyn SessionStorage>>,
    sink: Option<SinkHandle>,
}

impl PlaygroundBuilder {
    pub fn new(config: PlaygroundConfig) -> Self {
        Self {
            config,
            provider: None,
            surface: None,
            storage: None,
            sink: None,
        }
    }

    pub fn interpreter_provider(mut self, provider: Arc<dyn InterpreterProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn preview_surface(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn sink(mut self, sink: SinkHandle) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Playground, PlaygroundError> {
        let config = self.config;
        config.validate()?;

        let registry = Registry::new();
        let provider = match self.provider {
            Some(provider) => provider,
            None => Arc::new(WasiInterpreterProvider::new(config.wasm.clone())),
        };
        let surface = match self.surface {
            Some(surface) => surface,
            None => Arc::new(FilePreviewSurface::new(config.preview.resolved_output_dir())),
        };
        let storage = match self.storage {
            Some(storage) => storage,
            None => Arc::new(FileSessionStorage::new(config.session.resolved_storage_dir()?)),
        };
        let sink = self
            .sink
            .unwrap_or_else(|| SinkHandle::new(TerminalAdapter::new()));

        let loader = Arc::new(RuntimeLoader::new(registry, provider));
        let remote = RemoteStrategy::new(&config.remote)
            .map_err(|e| PlaygroundError::ConfigError(format!("Invalid remote client settings: {}", e)))?;
        let strategies = StrategySet {
            local: Arc::new(LocalStrategy::new(config.local.clone())),
            wasm: Arc::new(WasmStrategy::new(Arc::clone(&loader))),
            remote: Arc::new(remote),
            preview: Arc::new(PreviewStrategy::new(surface)),
        };
        let history = Arc::new(ExecutionHistory::new(config.history.capacity));
        let controller = ExecutionController::new(registry, Arc::clone(&loader), strategies, sink, history);
        let autosaver = Autosaver::new(SessionStore::new(storage), config.session.autosave_delay());

        Ok(Playground {
            registry,
            loader,
            controller,
            autosaver,
            editor: Mutex::new(EditorState::new(registry.default_language())),
        })
    }
}

struct EditorState {
    active: LanguageId,
    buffers: HashMap<LanguageId, String>,
}

impl EditorState {
    fn new(active: LanguageId) -> Self {
        Self {
            active,
            buffers: HashMap::new(),
        }
    }

    fn buffer(&mut self, registry: &Registry, language: LanguageId) -> &mut String {
        self.buffers
            .entry(language)
            .or_insert_with(|| registry.describe(language).default_source.to_string())
    }
}

pub struct Playground {
    registry: Registry,
    loader: Arc<RuntimeLoader>,
    controller: ExecutionController,
    autosaver: Autosaver,
    editor: Mutex<EditorState>,
}

impl Playground {
    pub fn builder(config: PlaygroundConfig) -> PlaygroundBuilder {
        PlaygroundBuilder::new(config)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn active_language(&self) -> LanguageId {
        self.editor().active
    }

    pub fn active_descriptor(&self) -> &'static LanguageDescriptor {
        self.registry.describe(self.active_language())
    }

    /// Switches the editor to `language` and waits for its runtime.
    ///
    /// The buffer of the language being left stays in memory; a save still
    /// pending for it is dropped, since only the active language is persisted.
    /// A load failure leaves `language` selected and is returned.
    pub async fn select_language(&self, language: LanguageId) -> Result<Option<Arc<RuntimeHandle>>, PlaygroundError> {
        {
            let mut editor = self.editor();
            if editor.active != language {
                self.autosaver.cancel();
                editor.active = language;
            }
            editor.buffer(&self.registry, language);
        }
        log::info!("Selected {}", self.registry.describe(language).display_name);
        Ok(self.loader.ensure_ready(language).await?)
    }

    pub fn source(&self) -> String {
        let mut editor = self.editor();
        let active = editor.active;
        editor.buffer(&self.registry, active).clone()
    }

    /// Replaces the active buffer and schedules an autosave.
    pub fn set_source(&self, source: impl Into<String>) {
        let source = source.into();
        let record = {
            let mut editor = self.editor();
            let active = editor.active;
            *editor.buffer(&self.registry, active) = source.clone();
            SessionRecord::new(self.registry.describe(active).display_name, source)
        };
        self.autosaver.schedule(record);
    }

    pub fn append_line(&self, line: &str) {
        let mut source = self.source();
        if !source.is_empty() && !source.ends_with('\n') {
            source.push('\n');
        }
        source.push_str(line);
        source.push('\n');
        self.set_source(source);
    }

    /// Puts the language's starter template back into the active buffer.
    pub fn reset_source(&self) {
        let template = self.active_descriptor().default_source;
        self.set_source(template);
    }

    /// Runs the active buffer.
    pub async fn run(&self) -> Result<RunResult, RunRejection> {
        let language = self.active_language();
        let source = self.source();
        self.controller.run(language, &source).await
    }

    /// Runs arbitrary text without touching the editor buffers.
    pub async fn run_source(&self, language: LanguageId, source: &str) -> Result<RunResult, RunRejection> {
        self.controller.run(language, source).await
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    pub fn runtime_state(&self, language: LanguageId) -> RuntimeState {
        self.loader.state(language)
    }

    pub async fn retry_runtime(&self) -> Result<Option<Arc<RuntimeHandle>>, PlaygroundError> {
        Ok(self.loader.retry(self.active_language()).await?)
    }

    /// Loads the persisted record and makes its language and code current.
    ///
    /// Records naming an unknown language are ignored.
    pub async fn restore(&self) -> Option<SessionRecord> {
        let record = self.autosaver.store().load().await?;
        let descriptor = match self.registry.find_by_display_name(&record.language) {
            Some(descriptor) => descriptor,
            None => {
                log::warn!("Saved session names unknown language '{}', ignoring", record.language);
                return None;
            }
        };
        let mut editor = self.editor();
        editor.active = descriptor.id;
        editor.buffers.insert(descriptor.id, record.code.clone());
        log::info!("Restored {} session from {}", descriptor.display_name, record.timestamp);
        Some(record)
    }

    pub async fn saved_session(&self) -> Option<SessionRecord> {
        self.autosaver.store().load().await
    }

    pub async fn clear_session(&self) {
        self.autosaver.cancel();
        self.autosaver.store().clear().await;
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.controller.history().list()
    }

    pub fn sink(&self) -> &SinkHandle {
        self.controller.sink()
    }

    pub fn clear_output(&self) {
        self.sink().clear();
    }

    /// Writes any pending autosave immediately.
    pub async fn shutdown(&self) {
        if self.autosaver.flush().await {
            log::debug!("Flushed pending session save");
        }
    }

    fn editor(&self) -> MutexGuard<'_, EditorState> {
        self.editor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
