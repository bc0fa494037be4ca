//! Prompt builder: turns a step and the run so far into one instruction payload.
//!
//! Every step after the first sees the verbatim output of *all* earlier steps,
//! labeled by persona, so late personas can still reason over the first ideas.

use sha2::{Digest, Sha256};

use brainstorm_shared::{BrainstormError, Result};

use crate::context::RunContext;
use crate::pipeline::Step;

/// Stateless payload builder. Identical inputs yield byte-identical payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the instruction payload for `step`.
    ///
    /// Only results with a position below `step.position` are included.
    pub fn build(&self, step: &Step, ctx: &RunContext) -> Result<String> {
        let topic = ctx.topic();
        if topic.trim().is_empty() {
            return Err(BrainstormError::invalid_input("topic must not be empty"));
        }

        let mut out = format!("Brainstorm topic: {topic}\n");
        if let Some(context) = ctx.free_text_context() {
            out.push_str(&format!("Additional context: {context}\n"));
        }

        let prior: Vec<_> = ctx
            .accumulated_output()
            .iter()
            .filter(|r| r.step_position < step.position)
            .collect();

        if !prior.is_empty() {
            out.push_str("\nContributions so far:\n");
            for result in prior {
                out.push_str(&format!(
                    "\n=== Step {} - {} ===\n{}\n",
                    result.step_position, result.persona_name, result.output_text
                ));
            }
        }

        out.push('\n');
        out.push_str(&render_template(&step.instruction_template, |name| match name {
            "topic" => Some(topic),
            "context" => Some(ctx.free_text_context().unwrap_or("")),
            "persona" => Some(step.persona.name.as_str()),
            _ => None,
        }));
        out.push_str(&format!("\n\nExpected output: {}\n", step.expected_output_hint));

        Ok(out)
    }
}

/// Substitute `{name}` placeholders in a single pass.
///
/// Unknown placeholders and unmatched braces are kept verbatim; substituted
/// values are never re-scanned.
fn render_template<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// SHA-256 of a payload, recorded on each step for auditing.
pub fn prompt_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}
