//! Core orchestration for multi-persona brainstorm runs.
//!
//! A [`Pipeline`] of persona steps runs strictly in order through an
//! [`Orchestrator`]. Each step sees the topic, the optional context, and every
//! earlier step's output, and the run folds into a [`RunReport`] whether it
//! completes or stops early.
//!
//! [`RunReport`]: brainstorm_shared::RunReport

pub mod assembler;
pub mod context;
pub mod invoker;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod roles;
pub mod state;
pub mod templates;

pub use context::RunContext;
pub use invoker::{HttpModelInvoker, Invocation, ModelInvoker};
pub use orchestrator::{
    CancelHandle, CancelSignal, Orchestrator, RunProgress, SilentProgress, cancel_pair,
};
pub use pipeline::{Pipeline, Step};
pub use prompt::{PromptBuilder, prompt_hash};
pub use roles::RoleRegistry;
pub use state::RunState;
pub use templates::{TEMPLATES, TopicSource, TopicTemplate};
