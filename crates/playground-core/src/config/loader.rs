//! Configuration loader for YAML files and environment overrides

use crate::config::types::*;
use crate::errors::PlaygroundError;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const ENV_REMOTE_ENDPOINT: &str = "PLAYGROUND_REMOTE_ENDPOINT";
pub const ENV_WASM_MODULE: &str = "PLAYGROUND_WASM_MODULE";
pub const ENV_SESSION_DIR: &str = "PLAYGROUND_SESSION_DIR";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file, falling back to defaults when it does not exist
    pub async fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<PlaygroundConfig, PlaygroundError> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::from_file(path).await
        } else {
            log::info!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Self::from_str("{}")
        }
    }

    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<PlaygroundConfig, PlaygroundError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            PlaygroundError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<PlaygroundConfig, PlaygroundError> {
        let mut config: PlaygroundConfig = if content.trim().is_empty() {
            PlaygroundConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                PlaygroundError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::resolve_environment(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn resolve_environment(config: &mut PlaygroundConfig) {
        if let Ok(endpoint) = env::var(ENV_REMOTE_ENDPOINT) {
            log::debug!("Remote endpoint overridden by {}", ENV_REMOTE_ENDPOINT);
            config.remote.endpoint = endpoint;
        }

        if let Ok(module) = env::var(ENV_WASM_MODULE) {
            log::debug!("Wasm module overridden by {}", ENV_WASM_MODULE);
            config.wasm.module = module;
        }

        if let Ok(dir) = env::var(ENV_SESSION_DIR) {
            log::debug!("Session directory overridden by {}", ENV_SESSION_DIR);
            config.session.storage_dir = Some(PathBuf::from(dir));
        }
    }
}
