// src/config/mod.rs

//! Configuration loading and validation for livehls.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate ranges and resolve duration strings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    Config, ControlPlaneSection, OutputSection, RawConfig, RetrySection, RetrySettings,
    SegmenterSection,
};
pub use validate::parse_duration;
