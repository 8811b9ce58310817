//! Single-flight loader for interpreter runtimes.
//!
//! Each Wasm language has one slot. The first `ensure_ready` call spawns the
//! acquisition and parks a shared future in the slot; later callers clone and
//! await that same future. The acquisition task writes the final `Ready` or
//! `Failed` state itself, so the slot settles even if every caller gives up
//! waiting. A failed slot is sticky until `retry` is called.

use super::{InterpreterProvider, RuntimeHandle, RuntimeState};
use crate::errors::LoadError;
use crate::registry::{LanguageId, Registry, StrategyKind};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type LoadOutcome = Result<Arc<RuntimeHandle>, LoadError>;
type LoadFuture = Shared<BoxFuture<'static, LoadOutcome>>;

enum Slot {
    Loading(LoadFuture),
    Ready(Arc<RuntimeHandle>),
    Failed(LoadError),
}

type Slots = Arc<Mutex<HashMap<LanguageId, Slot>>>;

pub struct RuntimeLoader {
    registry: Registry,
    provider: Arc<dyn InterpreterProvider>,
    slots: Slots,
}

impl RuntimeLoader {
    pub fn new(registry: Registry, provider: Arc<dyn InterpreterProvider>) -> Self {
        Self {
            registry,
            provider,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Makes sure the runtime for `language` is loaded.
    ///
    /// Resolves to `None` for languages that need no preloaded runtime. For a
    /// Wasm language, joins the in-flight load or starts one, and surfaces a
    /// previous failure without re-attempting it.
    pub async fn ensure_ready(&self, language: LanguageId) -> Result<Option<Arc<RuntimeHandle>>, LoadError> {
        let descriptor = self.registry.describe(language);
        if descriptor.strategy.kind() != StrategyKind::Wasm {
            return Ok(None);
        }

        let pending = {
            let mut slots = lock(&self.slots);
            match slots.get(&language) {
                Some(Slot::Ready(handle)) => return Ok(Some(Arc::clone(handle))),
                Some(Slot::Failed(err)) => return Err(err.clone()),
                Some(Slot::Loading(pending)) => pending.clone(),
                None => {
                    let pending = self.start_load(language);
                    slots.insert(language, Slot::Loading(pending.clone()));
                    pending
                }
            }
        };

        pending.await.map(Some)
    }

    /// Clears a failed load and tries again. Behaves like `ensure_ready` otherwise.
    pub async fn retry(&self, language: LanguageId) -> Result<Option<Arc<RuntimeHandle>>, LoadError> {
        {
            let mut slots = lock(&self.slots);
            if matches!(slots.get(&language), Some(Slot::Failed(_))) {
                log::info!("Retrying {} runtime load", language);
                slots.remove(&language);
            }
        }
        self.ensure_ready(language).await
    }

    pub fn state(&self, language: LanguageId) -> RuntimeState {
        match lock(&self.slots).get(&language) {
            None => RuntimeState::Unloaded,
            Some(Slot::Loading(_)) => RuntimeState::Loading,
            Some(Slot::Ready(_)) => RuntimeState::Ready,
            Some(Slot::Failed(err)) => RuntimeState::Failed(err.message.clone()),
        }
    }

    pub fn ready_handle(&self, language: LanguageId) -> Option<Arc<RuntimeHandle>> {
        match lock(&self.slots).get(&language) {
            Some(Slot::Ready(handle)) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    fn start_load(&self, language: LanguageId) -> LoadFuture {
        let descriptor = self.registry.describe(language);
        let provider = Arc::clone(&self.provider);
        let slots = Arc::clone(&self.slots);

        log::info!("Loading {} runtime", descriptor.display_name);
        let pending = async move {
            let outcome = provider
                .acquire(descriptor)
                .await
                .map(|interpreter| Arc::new(RuntimeHandle::new(language, interpreter)));

            let settled = match &outcome {
                Ok(handle) => {
                    log::info!("{} runtime ready ({})", descriptor.display_name, handle.interpreter().name());
                    Slot::Ready(Arc::clone(handle))
                }
                Err(err) => {
                    log::error!("{} runtime failed to load: {}", descriptor.display_name, err.message);
                    Slot::Failed(err.clone())
                }
            };
            lock(&slots).insert(language, settled);
            outcome
        }
        .boxed()
        .shared();

        // Drive the load to completion even if no caller keeps awaiting it
        tokio::spawn(pending.clone());
        pending
    }
}

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<LanguageId, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
