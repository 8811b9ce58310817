//! Configuration module for the playground
//!
//! YAML configuration with per-section defaults and a handful of environment
//! overrides for deployment-specific endpoints.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::PlaygroundError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<PlaygroundConfig, PlaygroundError> {
    ConfigLoader::from_file(path).await
}

/// Validate a configuration
pub fn validate_config(config: &PlaygroundConfig) -> Result<(), PlaygroundError> {
    config.validate()
}
