//! Run lifecycle: `NotStarted -> Running(i) -> Completed | Aborted`.

use brainstorm_shared::{BrainstormError, Result};

/// Where a run is in its lifecycle. Terminal states accept no transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    /// Executing the 1-based `step` of `total`.
    Running { step: usize, total: usize },
    Completed,
    Aborted { reason: String },
}

impl RunState {
    /// Begin a run of `total` steps.
    pub fn start(self, total: usize) -> Result<Self> {
        match self {
            Self::NotStarted if total > 0 => Ok(Self::Running { step: 1, total }),
            Self::NotStarted => Err(BrainstormError::state("cannot start a run with no steps")),
            other => Err(illegal(&other, "start")),
        }
    }

    /// The current step succeeded: advance, or complete after the last one.
    pub fn step_succeeded(self) -> Result<Self> {
        match self {
            Self::Running { step, total } if step < total => Ok(Self::Running {
                step: step + 1,
                total,
            }),
            Self::Running { .. } => Ok(Self::Completed),
            other => Err(illegal(&other, "advance")),
        }
    }

    /// Stop the run. Only a running run can be aborted.
    pub fn abort(self, reason: impl Into<String>) -> Result<Self> {
        match self {
            Self::Running { .. } => Ok(Self::Aborted {
                reason: reason.into(),
            }),
            other => Err(illegal(&other, "abort")),
        }
    }

    /// Step currently executing, if running.
    pub fn current_step(&self) -> Option<usize> {
        match self {
            Self::Running { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted { .. })
    }
}

fn illegal(state: &RunState, action: &str) -> BrainstormError {
    BrainstormError::state(format!("cannot {action} a run in state {state:?}"))
}
