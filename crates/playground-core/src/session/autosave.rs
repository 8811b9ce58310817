//! Debounced session saves.
//!
//! `schedule` arms a timer task for the quiet period. Scheduling again before
//! it fires aborts the armed task and starts over with the newer record, so a
//! burst of edits produces a single write. Once the timer has claimed a
//! record its write is never interrupted; `flush` waits for it instead.

use super::{SessionRecord, SessionStore};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

struct PendingSave {
    generation: u64,
    record: SessionRecord,
    task: JoinHandle<bool>,
}

#[derive(Default)]
struct AutosaveState {
    generation: u64,
    pending: Option<PendingSave>,
    /// Timer tasks that claimed their record and are writing it.
    saving: Vec<(u64, JoinHandle<bool>)>,
}

type SharedState = Arc<Mutex<AutosaveState>>;

pub struct Autosaver {
    store: SessionStore,
    quiet_period: Duration,
    state: SharedState,
}

impl Autosaver {
    pub fn new(store: SessionStore, quiet_period: Duration) -> Self {
        Self {
            store,
            quiet_period,
            state: Arc::new(Mutex::new(AutosaveState::default())),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Saves `record` once the quiet period passes without another schedule.
    pub fn schedule(&self, record: SessionRecord) {
        let mut state = lock(&self.state);
        if let Some(previous) = state.pending.take() {
            previous.task.abort();
        }
        state.generation += 1;
        let generation = state.generation;

        let store = self.store.clone();
        let shared = Arc::clone(&self.state);
        let quiet_period = self.quiet_period;
        let task = tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            // Claim the record before writing so flush/cancel cannot interrupt the write
            let record = {
                let mut state = lock(&shared);
                match state.pending.take() {
                    Some(pending) if pending.generation == generation => {
                        state.saving.push((generation, pending.task));
                        pending.record
                    }
                    other => {
                        state.pending = other;
                        return false;
                    }
                }
            };
            let saved = store.save(&record).await;
            lock(&shared).saving.retain(|(claimed, _)| *claimed != generation);
            saved
        });

        state.pending = Some(PendingSave {
            generation,
            record,
            task,
        });
    }

    /// Drops a scheduled save, if any.
    pub fn cancel(&self) {
        if let Some(pending) = lock(&self.state).pending.take() {
            pending.task.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    /// Writes a scheduled save immediately instead of waiting for its timer,
    /// after any save the timer already started has finished.
    ///
    /// Returns whether a record was written during the call.
    pub async fn flush(&self) -> bool {
        let (pending, saving) = {
            let mut state = lock(&self.state);
            (state.pending.take(), std::mem::take(&mut state.saving))
        };

        let mut saved = false;
        for (_, task) in saving {
            saved |= task.await.unwrap_or(false);
        }
        if let Some(pending) = pending {
            pending.task.abort();
            saved = self.store.save(&pending.record).await;
        }
        saved
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(state: &SharedState) -> MutexGuard<'_, AutosaveState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
