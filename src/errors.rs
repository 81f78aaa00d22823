// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentpipeError {
    /// Invalid option or input; raised before anything is spawned.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to spawn '{program}': {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Post-processing error: {0}")]
    PostProcessError(String),

    #[error("Failed to prepare channel at {path:?}: {reason}")]
    ChannelError { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentpipeError>;
