//! Best-effort persistence of the editor buffer.
//!
//! One record under one fixed key: the language that was active and its
//! source text. It is a convenience cache, so every storage failure is logged
//! and swallowed here rather than returned to the caller.

pub mod autosave;
pub mod storage;

pub use autosave::Autosaver;
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_KEY: &str = "playground-session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Display name of the active language
    pub language: String,
    pub code: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl SessionRecord {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Persists `record`, returning whether the write went through.
    pub async fn save(&self, record: &SessionRecord) -> bool {
        let encoded = match serde_json::to_string(record) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("Could not encode session record: {}", e);
                return false;
            }
        };
        match self.storage.write(SESSION_KEY, &encoded).await {
            Ok(()) => {
                log::debug!("Session saved ({}, {} bytes)", record.language, record.code.len());
                true
            }
            Err(e) => {
                log::warn!("Failed to save session: {}", e);
                false
            }
        }
    }

    pub async fn load(&self) -> Option<SessionRecord> {
        let raw = match self.storage.read(SESSION_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Failed to read session: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Ignoring malformed session record: {}", e);
                None
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.storage.remove(SESSION_KEY).await {
            log::warn!("Failed to clear session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = SessionStore::new(Arc::new(MemorySessionStorage::new()));
        let record = SessionRecord::new("Python", "print('hi')\n");

        assert!(store.save(&record).await);
        assert_eq!(store.load().await, Some(record));
    }

    #[tokio::test]
    async fn test_clear_removes_record() {
        let store = SessionStore::new(Arc::new(MemorySessionStorage::new()));
        store.save(&SessionRecord::new("Go", "package main")).await;
        store.clear().await;
        assert_eq!(store.load().await, None);
        // Clearing twice is harmless
        store.clear().await;
    }

    #[tokio::test]
    async fn test_record_uses_fixed_key_and_schema() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionStore::new(storage.clone());
        let record = SessionRecord {
            language: "Rust".to_string(),
            code: "fn main() {}".to_string(),
            timestamp: 1_700_000_000_000,
        };
        store.save(&record).await;

        let raw: serde_json::Value = serde_json::from_str(&storage.raw(SESSION_KEY).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({ "language": "Rust", "code": "fn main() {}", "timestamp": 1_700_000_000_000i64 })
        );
    }

    #[tokio::test]
    async fn test_malformed_record_loads_as_none() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.insert_raw(SESSION_KEY, "{not json");
        let store = SessionStore::new(storage);
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_failed_save_is_swallowed() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.set_unavailable(true);
        let store = SessionStore::new(storage.clone());
        assert!(!store.save(&SessionRecord::new("C", "int main;")).await);
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = SessionRecord::new("JavaScript", "console.log(1)");
        SessionStore::new(Arc::new(FileSessionStorage::new(dir.path())))
            .save(&record)
            .await;

        let reopened = SessionStore::new(Arc::new(FileSessionStorage::new(dir.path())));
        assert_eq!(reopened.load().await, Some(record));
    }
}
