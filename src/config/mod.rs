// src/config/mod.rs

//! Configuration for agentpipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate provider and prompt inputs (`validate.rs`).
//! - Parse the custom environment block (`env_block.rs`).
//! - Build the argv/environment of one agent run (`builder.rs`).

pub mod builder;
pub mod env_block;
pub mod loader;
pub mod model;
pub mod validate;

pub use builder::{BASE_ARGS, DEFAULT_TIMEOUT, PreparedConfig, prepare_run_config};
pub use env_block::parse_custom_env;
pub use loader::load_from_path;
pub use model::{ConfigFile, PromptSection, ProviderSettings, RunOptions, RuntimeSection};
pub use validate::validate_inputs;
