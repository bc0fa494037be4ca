//! Run-scoped accumulator: topic, free-text context, and completed steps.

use brainstorm_shared::{BrainstormError, Result, StepResult};

/// Mutable state owned by one run. Never shared between runs.
#[derive(Debug, Clone)]
pub struct RunContext {
    topic: String,
    free_text_context: Option<String>,
    accumulated_output: Vec<StepResult>,
}

impl RunContext {
    /// Start a fresh context. The topic must contain non-whitespace text;
    /// a blank context is stored as `None`.
    pub fn new(topic: &str, context: Option<&str>) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(BrainstormError::invalid_input("topic must not be empty"));
        }
        let free_text_context = context
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        Ok(Self {
            topic: topic.to_string(),
            free_text_context,
            accumulated_output: Vec::new(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn free_text_context(&self) -> Option<&str> {
        self.free_text_context.as_deref()
    }

    /// Completed steps in position order.
    pub fn accumulated_output(&self) -> &[StepResult] {
        &self.accumulated_output
    }

    /// Append the next completed step. Positions must arrive as 1, 2, 3, ...
    pub fn push(&mut self, result: StepResult) -> Result<()> {
        let expected = self.accumulated_output.len() + 1;
        if result.step_position != expected {
            return Err(BrainstormError::state(format!(
                "expected result for step {expected}, got step {}",
                result.step_position
            )));
        }
        self.accumulated_output.push(result);
        Ok(())
    }

    /// Consume the context, yielding its parts for report assembly.
    pub fn into_parts(self) -> (String, Option<String>, Vec<StepResult>) {
        (self.topic, self.free_text_context, self.accumulated_output)
    }
}
