//! Core domain types for brainstorm runs.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BrainstormError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// First eight hex characters, used in file names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// Behavioral limits attached to a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaConstraints {
    /// Maximum reasoning iterations the persona may spend on one step.
    pub max_iterations: u32,
    /// Ceiling on model calls per minute for this persona. `0` disables it.
    pub max_rpm: u32,
}

/// A fixed behavioral profile assigned to one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Stable lookup key (e.g. `creative`).
    pub key: String,
    /// Display name, unique within a registry.
    pub name: String,
    /// What the persona is trying to achieve.
    pub goal: String,
    /// Background that shapes the persona's voice.
    pub backstory: String,
    pub constraints: PersonaConstraints,
}

impl Persona {
    /// System message sent alongside every instruction payload for this persona.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the {}. {}\n\nYour goal: {}",
            self.name, self.backstory, self.goal
        )
    }
}

// ---------------------------------------------------------------------------
// Token usage
// ---------------------------------------------------------------------------

/// Token counters for one call or an aggregate of calls.
///
/// Every field defaults to zero when a provider omits it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a TokenUsage> for TokenUsage {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Immutable record of one completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based position of the step in the pipeline.
    pub step_position: usize,
    pub persona_name: String,
    pub output_text: String,
    pub token_usage: TokenUsage,
    /// SHA-256 of the instruction payload that produced this output.
    pub prompt_sha256: String,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step in the pipeline succeeded.
    Completed,
    /// A Model Invoker call failed; later steps never ran.
    Aborted {
        failed_position: usize,
        persona: String,
        /// Invoker failure class (`auth`, `rate_limit`, ...).
        kind: String,
        reason: String,
    },
    /// The caller cancelled the run before `next_position` finished.
    Cancelled { next_position: usize },
}

/// Final or partial deliverable of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub topic: String,
    /// Free-text context, if the caller supplied any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_text_context: Option<String>,
    pub model_id: String,
    /// Persona names in pipeline order.
    pub agents_used: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Number of steps the pipeline defines.
    pub pipeline_len: usize,
    /// Completed steps, strictly ordered by position.
    pub steps: Vec<StepResult>,
    /// Output of the last completed step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    pub aggregate_usage: TokenUsage,
    pub outcome: RunOutcome,
}

impl RunReport {
    /// True when every pipeline step produced a result.
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.steps.len() == self.pipeline_len
    }

    /// Human-readable reason the run stopped early, if it did.
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Aborted {
                failed_position,
                persona,
                reason,
                ..
            } => Some(format!("step {failed_position} ({persona}) failed: {reason}")),
            RunOutcome::Cancelled { next_position } => {
                Some(format!("cancelled before step {next_position} completed"))
            }
        }
    }

    /// Convert a partial report into [`BrainstormError::Aborted`].
    pub fn into_result(self) -> Result<RunReport> {
        match self.failure_reason() {
            None => Ok(self),
            Some(reason) => Err(BrainstormError::Aborted {
                reason,
                report: Box::new(self),
            }),
        }
    }
}
