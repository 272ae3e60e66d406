//! Configuration loading from disk.

use std::path::Path;

use thiserror::Error;

use crate::config::schema::MirrorConfig;
use crate::config::validation::{validate, ValidationError};

/// Fatal configuration errors; the process exits non-zero on any of them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {}", render(.0))]
    Validation(Vec<ValidationError>),
    #[error("{0}")]
    Invalid(String),
}

fn render(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load and validate a configuration from a TOML file.
pub fn load(path: &Path) -> Result<MirrorConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: MirrorConfig = toml::from_str(&content)?;
    validate(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
