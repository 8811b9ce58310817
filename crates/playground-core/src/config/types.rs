//! Configuration type definitions for the playground
//!
//! Every section has defaults, so an empty YAML document (or no file at all)
//! yields a working configuration. Sections only need to be spelled out when a
//! deployment points the remote strategy at its own execution service or ships
//! its own interpreter module.

use crate::errors::PlaygroundError;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const SOURCE_PLACEHOLDER: &str = "{source}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub wasm: WasmConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_endpoint")]
    pub endpoint: String,
    /// Client-side request timeout. Unset leaves limits to the service.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_remote_endpoint(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasmConfig {
    /// `http(s)://` URL or filesystem path of the WASI interpreter module.
    #[serde(default = "default_wasm_module")]
    pub module: String,
    /// Expected lowercase hex SHA-256 of the module bytes.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Interpreter argv; `{source}` is replaced with the program text.
    #[serde(default = "default_wasm_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub preopens: Vec<PreopenDir>,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for WasmConfig {
    fn default() -> Self {
        Self {
            module: default_wasm_module(),
            sha256: None,
            args: default_wasm_args(),
            preopens: Vec::new(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreopenDir {
    pub host: PathBuf,
    pub guest: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub loop_iteration_limit: Option<u64>,
    #[serde(default)]
    pub recursion_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the persisted session. Defaults to the user data dir.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
}

impl SessionConfig {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn resolved_storage_dir(&self) -> Result<PathBuf, PlaygroundError> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }
        dirs::data_local_dir()
            .map(|dir| dir.join("playground"))
            .ok_or_else(|| {
                PlaygroundError::ConfigError("Could not determine a local data directory".to_string())
            })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            autosave_delay_ms: default_autosave_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Where the file surface writes host pages. Defaults to the temp dir.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl PreviewConfig {
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("playground-preview"))
    }
}

fn default_remote_endpoint() -> String {
    "https://emkc.org/api/v2/piston/execute".to_string()
}

fn default_wasm_module() -> String {
    "https://github.com/vmware-labs/webassembly-language-runtimes/releases/download/python%2F3.12.0%2B20231211-040d5a6/python-3.12.0.wasm".to_string()
}

fn default_wasm_args() -> Vec<String> {
    vec![
        "python".to_string(),
        "-c".to_string(),
        SOURCE_PLACEHOLDER.to_string(),
    ]
}

fn default_max_output_bytes() -> usize { 1024 * 1024 }
fn default_autosave_delay_ms() -> u64 { 3000 }
fn default_history_capacity() -> usize { DEFAULT_HISTORY_CAPACITY }

impl PlaygroundConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PlaygroundError> {
        if self.history.capacity == 0 {
            return Err(PlaygroundError::ConfigError(
                "History capacity must be greater than 0".to_string(),
            ));
        }

        let endpoint = self.remote.endpoint.as_str();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(PlaygroundError::ConfigError(format!(
                "Remote endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }

        if self.wasm.module.trim().is_empty() {
            return Err(PlaygroundError::ConfigError(
                "Wasm module location cannot be empty".to_string(),
            ));
        }

        if !self.wasm.args.iter().any(|arg| arg.contains(SOURCE_PLACEHOLDER)) {
            return Err(PlaygroundError::ConfigError(format!(
                "Wasm args must contain the {} placeholder",
                SOURCE_PLACEHOLDER
            )));
        }

        if let Some(digest) = &self.wasm.sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(PlaygroundError::ConfigError(
                    "Wasm sha256 must be 64 hex characters".to_string(),
                ));
            }
        }

        if self.wasm.max_output_bytes == 0 {
            return Err(PlaygroundError::ConfigError(
                "Wasm max_output_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
