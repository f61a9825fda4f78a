use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModewardError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown mode '{0}'. Valid modes: administrative, companion, operational")]
    UnknownMode(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
