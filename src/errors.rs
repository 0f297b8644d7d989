// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::manifest::ManifestError;

#[derive(Error, Debug)]
pub enum LivehlsError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Job runtime is gone: {0}")]
    JobGone(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LivehlsError>;
