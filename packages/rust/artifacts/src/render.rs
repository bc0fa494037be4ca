//! Plain-text rendering of a [`RunReport`].

use std::fmt::Write;

use brainstorm_shared::{RunOutcome, RunReport};

/// Render the human-readable report.
///
/// ```text
/// AI Brainstorm Report
/// ====================
///
/// Topic: ...
/// Context: ...            (only when present)
/// Started: ... / Completed: ...
/// Model: ...
/// Agents Used: A, B, C
/// Status: completed (5/5 steps)
///
/// Task Results
/// ------------
///
/// Task 1 (A):
/// ...
///
/// Final Result
/// ------------
/// ...
///
/// Token Usage
/// -----------
/// Total Tokens: N
/// ...
/// ```
pub fn render_readable(report: &RunReport) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = write_header(&mut out, report);
    let _ = write_tasks(&mut out, report);
    let _ = write_final(&mut out, report);
    let _ = write_usage(&mut out, report);

    out
}

fn write_header(out: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(out, "AI Brainstorm Report")?;
    writeln!(out, "====================")?;
    writeln!(out)?;
    writeln!(out, "Run: {}", report.run_id)?;
    writeln!(out, "Topic: {}", report.topic)?;
    if let Some(context) = &report.free_text_context {
        writeln!(out, "Context: {context}")?;
    }
    writeln!(out, "Started: {}", report.started_at.to_rfc3339())?;
    writeln!(out, "Completed: {}", report.completed_at.to_rfc3339())?;
    writeln!(out, "Model: {}", report.model_id)?;
    writeln!(out, "Agents Used: {}", report.agents_used.join(", "))?;
    writeln!(
        out,
        "Status: {} ({}/{} steps)",
        status_label(&report.outcome),
        report.steps.len(),
        report.pipeline_len
    )?;
    if let Some(reason) = report.failure_reason() {
        writeln!(out, "Reason: {reason}")?;
    }
    writeln!(out)
}

fn write_tasks(out: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(out, "Task Results")?;
    writeln!(out, "------------")?;
    if report.steps.is_empty() {
        writeln!(out, "\n(no steps completed)")?;
    }
    for step in &report.steps {
        writeln!(out, "\nTask {} ({}):", step.step_position, step.persona_name)?;
        writeln!(out, "{}", step.output_text)?;
    }
    Ok(())
}

fn write_final(out: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(out, "\nFinal Result")?;
    writeln!(out, "------------")?;
    match (&report.final_output, report.is_complete()) {
        (Some(text), true) => writeln!(out, "{text}"),
        (Some(text), false) => {
            writeln!(out, "(partial: output of the last completed step)")?;
            writeln!(out, "{text}")
        }
        (None, _) => writeln!(out, "(none)"),
    }
}

fn write_usage(out: &mut String, report: &RunReport) -> std::fmt::Result {
    let usage = &report.aggregate_usage;
    writeln!(out, "\nToken Usage")?;
    writeln!(out, "-----------")?;
    writeln!(out, "Total Tokens: {}", usage.total_tokens)?;
    writeln!(out, "Prompt Tokens: {}", usage.prompt_tokens)?;
    writeln!(out, "Completion Tokens: {}", usage.completion_tokens)
}

fn status_label(outcome: &RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Aborted { .. } => "aborted",
        RunOutcome::Cancelled { .. } => "cancelled",
    }
}
