//! Shared types, error model, and configuration for brainstorm runs.
//!
//! This crate is the foundation depended on by all other brainstorm crates.
//! It provides:
//! - [`BrainstormError`] and [`InvokeError`], the unified error types
//! - Domain types ([`Persona`], [`StepResult`], [`TokenUsage`], [`RunReport`])
//! - Configuration ([`AppConfig`], [`ModelConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ModelConfig, ModelOverrides, ModelSection, SUPPORTED_MODELS,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_model,
};
pub use error::{BrainstormError, InvokeError, Result};
pub use types::{
    Persona, PersonaConstraints, RunId, RunOutcome, RunReport, StepResult, TokenUsage,
};
