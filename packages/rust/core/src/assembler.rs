//! Report assembler: folds a finished or stopped run into a [`RunReport`].

use chrono::{DateTime, Utc};

use brainstorm_shared::{RunId, RunOutcome, RunReport, TokenUsage};

use crate::context::RunContext;

/// Run-level metadata that does not live in the [`RunContext`].
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub run_id: RunId,
    pub model_id: String,
    /// Persona names in pipeline order.
    pub agents_used: Vec<String>,
    pub pipeline_len: usize,
}

/// Build the report from the context's completed steps.
///
/// `final_output` is the last completed step's output, also for partial runs;
/// compare `steps.len()` with `pipeline_len` to tell them apart.
pub fn assemble(
    ctx: RunContext,
    usage_totals: TokenUsage,
    started_at: DateTime<Utc>,
    header: ReportHeader,
    outcome: RunOutcome,
) -> RunReport {
    let (topic, free_text_context, steps) = ctx.into_parts();

    debug_assert_eq!(
        usage_totals,
        steps.iter().map(|s| &s.token_usage).sum::<TokenUsage>(),
        "running usage total diverged from per-step usage"
    );

    let final_output = steps.last().map(|s| s.output_text.clone());

    RunReport {
        run_id: header.run_id,
        topic,
        free_text_context,
        model_id: header.model_id,
        agents_used: header.agents_used,
        started_at,
        completed_at: Utc::now(),
        pipeline_len: header.pipeline_len,
        steps,
        final_output,
        aggregate_usage: usage_totals,
        outcome,
    }
}
