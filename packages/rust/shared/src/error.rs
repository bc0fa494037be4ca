//! Error types for the brainstorm pipeline.
//!
//! Library crates use [`BrainstormError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::types::RunReport;

/// Failure reported by a Model Invoker for a single call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    /// Credential rejected by the provider.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider refused the call because of rate limiting.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Provider rejected the request payload or model parameters.
    #[error("request rejected: {0}")]
    Validation(String),

    /// Network, server-side, or response decoding failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The run was cancelled while the call was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl InvokeError {
    /// Short machine-readable class name, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::RateLimit(_) => "rate_limit",
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Top-level error type for all brainstorm operations.
#[derive(Debug, thiserror::Error)]
pub enum BrainstormError {
    /// Invalid or missing credential, out-of-range sampling parameter,
    /// unsupported model id, or an unreadable config file.
    #[error("config error: {message}")]
    Config { message: String },

    /// Empty topic, unknown template, or other bad caller input.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A Model Invoker call failed while executing a step.
    #[error("step {position} ({persona}) failed: {source}")]
    StepInvocation {
        position: usize,
        persona: String,
        source: InvokeError,
    },

    /// A run stopped before the final step. Carries the partial report.
    #[error("run aborted after {} of {} steps: {reason}", .report.steps.len(), .report.pipeline_len)]
    Aborted {
        reason: String,
        report: Box<RunReport>,
    },

    /// Illegal run state transition.
    #[error("state error: {message}")]
    State { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON/TOML encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BrainstormError>;

impl BrainstormError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create a state-machine error from any displayable message.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors raised before any step runs (zero side effects).
    pub fn is_fail_fast(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidInput { .. })
    }
}
