//! Sequential orchestrator: runs the pipeline one step at a time.
//!
//! 1. Validate topic and model config (fail fast, nothing invoked)
//! 2. For each step in position order: build payload, invoke, record result
//! 3. Stop at the first invoker failure or cancellation, keeping completed steps
//! 4. Assemble the (possibly partial) report

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use brainstorm_shared::{
    BrainstormError, InvokeError, ModelConfig, Result, RunId, RunOutcome, RunReport, StepResult,
    TokenUsage,
};

use crate::assembler::{self, ReportHeader};
use crate::context::RunContext;
use crate::invoker::ModelInvoker;
use crate::pipeline::Pipeline;
use crate::prompt::{PromptBuilder, prompt_hash};
use crate::state::RunState;

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait RunProgress: Send + Sync {
    /// Called once, after validation, before the first step.
    fn run_started(&self, run_id: &RunId, topic: &str, personas: &[String]);
    /// Called before a step's model call.
    fn step_started(&self, position: usize, total: usize, persona: &str);
    /// Called after a step's result is recorded.
    fn step_finished(&self, result: &StepResult, total: usize);
    /// Called with the final or partial report.
    fn run_finished(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn run_started(&self, _run_id: &RunId, _topic: &str, _personas: &[String]) {}
    fn step_started(&self, _position: usize, _total: usize, _persona: &str) {}
    fn step_finished(&self, _result: &StepResult, _total: usize) {}
    fn run_finished(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Requests cancellation of a run. Cloneable; cancelling twice is harmless.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed by the orchestrator between and during steps.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested; pend forever if it never can be.
    pub async fn cancelled(&mut self) {
        let fired = self.rx.wait_for(|c| *c).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a connected cancel handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives a [`Pipeline`] through a [`ModelInvoker`].
///
/// Holds no per-run state; every call to [`Orchestrator::run`] starts from a
/// fresh [`RunContext`], so one orchestrator can serve concurrent runs.
pub struct Orchestrator {
    pipeline: Pipeline,
    invoker: Arc<dyn ModelInvoker>,
    model: ModelConfig,
    prompts: PromptBuilder,
}

impl Orchestrator {
    /// Validates `model` up front; a bad config never reaches the invoker.
    pub fn new(
        pipeline: Pipeline,
        invoker: Arc<dyn ModelInvoker>,
        model: ModelConfig,
    ) -> Result<Self> {
        model.validate()?;
        Ok(Self {
            pipeline,
            invoker,
            model,
            prompts: PromptBuilder,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Run the whole pipeline without external cancellation.
    pub async fn run(
        &self,
        topic: &str,
        context: Option<&str>,
        progress: &dyn RunProgress,
    ) -> Result<RunReport> {
        self.run_until_cancelled(topic, context, progress, CancelSignal::never())
            .await
    }

    /// Run the pipeline, stopping early if `cancel` fires.
    ///
    /// Returns `Err` only for invalid input raised before any step executes.
    /// Invoker failures and cancellation yield `Ok` with a partial report whose
    /// `outcome` names the reason; use [`RunReport::into_result`] to turn that
    /// into an error.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, steps = self.pipeline.len()))]
    pub async fn run_until_cancelled(
        &self,
        topic: &str,
        context: Option<&str>,
        progress: &dyn RunProgress,
        mut cancel: CancelSignal,
    ) -> Result<RunReport> {
        let mut ctx = RunContext::new(topic, context)?;

        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(&run_id));

        let total = self.pipeline.len();
        let agents = self.pipeline.persona_names();
        let started_at = Utc::now();
        let mut state = RunState::NotStarted.start(total)?;
        let mut usage = TokenUsage::default();
        let mut outcome = RunOutcome::Completed;

        info!(topic = %ctx.topic(), model = %self.model.model_id, "starting brainstorm run");
        progress.run_started(&run_id, ctx.topic(), &agents);

        for step in self.pipeline.steps() {
            debug_assert_eq!(state.current_step(), Some(step.position));

            if cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled {
                    next_position: step.position,
                };
                state = state.abort("cancelled")?;
                break;
            }

            progress.step_started(step.position, total, &step.persona.name);
            let payload = self.prompts.build(step, &ctx)?;
            debug!(
                step = step.position,
                persona = %step.persona.name,
                payload_len = payload.len(),
                "invoking model"
            );

            let call = self.invoker.invoke(&step.persona, &payload, &self.model);
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(InvokeError::Cancelled),
                res = call => res,
            };

            match result {
                Ok(invocation) => {
                    usage += invocation.usage;
                    let step_result = StepResult {
                        step_position: step.position,
                        persona_name: step.persona.name.clone(),
                        output_text: invocation.output_text,
                        token_usage: invocation.usage,
                        prompt_sha256: prompt_hash(&payload),
                        completed_at: Utc::now(),
                    };
                    info!(
                        step = step.position,
                        persona = %step.persona.name,
                        tokens = invocation.usage.total_tokens,
                        "step complete"
                    );
                    progress.step_finished(&step_result, total);
                    ctx.push(step_result)?;
                    state = state.step_succeeded()?;
                }
                Err(InvokeError::Cancelled) => {
                    warn!(step = step.position, "run cancelled during model call");
                    outcome = RunOutcome::Cancelled {
                        next_position: step.position,
                    };
                    state = state.abort("cancelled")?;
                    break;
                }
                Err(source) => {
                    outcome = RunOutcome::Aborted {
                        failed_position: step.position,
                        persona: step.persona.name.clone(),
                        kind: source.kind().to_string(),
                        reason: source.to_string(),
                    };
                    let err = BrainstormError::StepInvocation {
                        position: step.position,
                        persona: step.persona.name.clone(),
                        source,
                    };
                    warn!(error = %err, completed = ctx.accumulated_output().len(), "aborting run");
                    state = state.abort(err.to_string())?;
                    break;
                }
            }
        }

        debug_assert!(state.is_terminal());

        let header = ReportHeader {
            run_id,
            model_id: self.model.model_id.clone(),
            agents_used: agents,
            pipeline_len: total,
        };
        let report = assembler::assemble(ctx, usage, started_at, header, outcome);

        info!(
            completed = report.steps.len(),
            total,
            total_tokens = report.aggregate_usage.total_tokens,
            complete = report.is_complete(),
            "brainstorm run finished"
        );
        progress.run_finished(&report);

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use brainstorm_shared::{AppConfig, ModelOverrides, Persona, PersonaConstraints};

    use super::*;
    use crate::invoker::Invocation;
    use crate::roles::RoleRegistry;
    use crate::templates::TopicSource;

    /// Returns `OUT_i` with `10 * i` total tokens for call `i`, failing on request.
    struct ScriptedInvoker {
        fail_at: Option<(usize, InvokeError)>,
        cancel_at: Option<(usize, CancelHandle)>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedInvoker {
        fn new() -> Self {
            Self {
                fail_at: None,
                cancel_at: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_at(position: usize, err: InvokeError) -> Self {
            Self {
                fail_at: Some((position, err)),
                ..Self::new()
            }
        }

        fn cancelling_at(position: usize, handle: CancelHandle) -> Self {
            Self {
                cancel_at: Some((position, handle)),
                ..Self::new()
            }
        }

        fn payloads(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelInvoker for ScriptedInvoker {
        async fn invoke(
            &self,
            persona: &Persona,
            payload: &str,
            _model: &ModelConfig,
        ) -> std::result::Result<Invocation, InvokeError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((persona.name.clone(), payload.to_string()));
                calls.len()
            };
            if let Some((at, err)) = &self.fail_at {
                if *at == n {
                    return Err(err.clone());
                }
            }
            if let Some((at, handle)) = &self.cancel_at {
                if *at == n {
                    handle.cancel();
                    std::future::pending::<()>().await;
                }
            }
            let tokens = 10 * n as u64;
            Ok(Invocation {
                output_text: format!("OUT_{n}"),
                usage: TokenUsage::new(tokens - 3, 3, tokens),
            })
        }
    }

    fn model() -> ModelConfig {
        let overrides = ModelOverrides {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        ModelConfig::resolve_with(&overrides, &AppConfig::default(), |_: &str| None).unwrap()
    }

    fn pipeline() -> Pipeline {
        Pipeline::brainstorm(&RoleRegistry::builtin(PersonaConstraints {
            max_iterations: 3,
            max_rpm: 0,
        }))
        .unwrap()
    }

    fn orchestrator(invoker: Arc<ScriptedInvoker>) -> Orchestrator {
        Orchestrator::new(pipeline(), invoker, model()).unwrap()
    }

    #[tokio::test]
    async fn end_to_end_startup_scenario() {
        let (topic, context) = TopicSource::Template("startup".into()).resolve().unwrap();
        let invoker = Arc::new(ScriptedInvoker::new());
        let orch = orchestrator(invoker.clone());

        let report = orch
            .run(&topic, context.as_deref(), &SilentProgress)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.outcome, RunOutcome::Completed);
        let positions: Vec<usize> = report.steps.iter().map(|s| s.step_position).collect();
        assert_eq!(positions, [1, 2, 3, 4, 5]);
        assert_eq!(report.final_output.as_deref(), Some("OUT_5"));
        assert_eq!(report.aggregate_usage.total_tokens, 10 + 20 + 30 + 40 + 50);
        assert_eq!(
            report.aggregate_usage.total_tokens,
            report.steps.iter().map(|s| s.token_usage.total_tokens).sum::<u64>()
        );
        assert_eq!(report.topic, "Creating an AI technology startup");
        assert_eq!(report.agents_used.len(), 5);
        assert_eq!(invoker.call_count(), 5);
    }

    #[tokio::test]
    async fn each_payload_carries_all_prior_outputs_and_nothing_later() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let orch = orchestrator(invoker.clone());
        orch.run("topic", None, &SilentProgress).await.unwrap();

        let payloads = invoker.payloads();
        assert_eq!(payloads.len(), 5);
        for (i, payload) in payloads.iter().enumerate() {
            let position = i + 1;
            for earlier in 1..position {
                assert!(payload.contains(&format!("OUT_{earlier}")), "step {position} lacks OUT_{earlier}");
            }
            for later in position..=5 {
                assert!(!payload.contains(&format!("OUT_{later}")), "step {position} sees OUT_{later}");
            }
        }
    }

    #[tokio::test]
    async fn step_records_hash_of_sent_payload() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let orch = orchestrator(invoker.clone());
        let report = orch.run("topic", None, &SilentProgress).await.unwrap();

        for (step, payload) in report.steps.iter().zip(invoker.payloads()) {
            assert_eq!(step.prompt_sha256, prompt_hash(&payload));
        }
    }

    #[tokio::test]
    async fn failure_at_step_three_preserves_first_two() {
        let invoker = Arc::new(ScriptedInvoker::failing_at(
            3,
            InvokeError::Transport("connection reset".into()),
        ));
        let orch = orchestrator(invoker.clone());
        let report = orch.run("topic", None, &SilentProgress).await.unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.final_output.as_deref(), Some("OUT_2"));
        assert_eq!(report.aggregate_usage.total_tokens, 30);
        assert_eq!(invoker.call_count(), 3, "no retry, no skipping ahead");
        match &report.outcome {
            RunOutcome::Aborted {
                failed_position,
                persona,
                kind,
                reason,
            } => {
                assert_eq!(*failed_position, 3);
                assert_eq!(persona, "UX/User Experience Expert");
                assert_eq!(kind, "transport");
                assert!(reason.contains("connection reset"));
            }
            other => panic!("expected Aborted, got {other:?}"),
        }

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, BrainstormError::Aborted { .. }));
    }

    #[tokio::test]
    async fn failure_at_first_step_yields_empty_report() {
        let invoker = Arc::new(ScriptedInvoker::failing_at(1, InvokeError::Auth("401".into())));
        let orch = orchestrator(invoker);
        let report = orch.run("topic", None, &SilentProgress).await.unwrap();

        assert!(report.steps.is_empty());
        assert!(report.final_output.is_none());
        assert_eq!(report.aggregate_usage, TokenUsage::default());
        assert!(report.failure_reason().unwrap().contains("authentication failed"));
    }

    #[tokio::test]
    async fn empty_topic_fails_before_any_call() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let orch = orchestrator(invoker.clone());

        let err = orch.run("  ", Some("ctx"), &SilentProgress).await.unwrap_err();
        assert!(matches!(err, BrainstormError::InvalidInput { .. }));
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_temperature_fails_fast() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let mut bad = model();
        bad.temperature = 1.5;

        let err = Orchestrator::new(pipeline(), invoker.clone(), bad)
            .err()
            .expect("config error");
        assert!(matches!(err, BrainstormError::Config { .. }));
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn cancel_before_start_runs_nothing() {
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let invoker = Arc::new(ScriptedInvoker::new());
        let orch = orchestrator(invoker.clone());
        let report = orch
            .run_until_cancelled("topic", None, &SilentProgress, signal)
            .await
            .unwrap();

        assert!(report.steps.is_empty());
        assert_eq!(report.outcome, RunOutcome::Cancelled { next_position: 1 });
        assert_eq!(invoker.call_count(), 0);
    }

    #[tokio::test]
    async fn cancel_during_call_keeps_completed_steps() {
        let (handle, signal) = cancel_pair();
        let invoker = Arc::new(ScriptedInvoker::cancelling_at(2, handle));
        let orch = orchestrator(invoker.clone());

        let report = orch
            .run_until_cancelled("topic", None, &SilentProgress, signal)
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.final_output.as_deref(), Some("OUT_1"));
        assert_eq!(report.outcome, RunOutcome::Cancelled { next_position: 2 });
        assert_eq!(invoker.call_count(), 2);
    }

    #[tokio::test]
    async fn custom_pipeline_substitutes_roles() {
        let constraints = PersonaConstraints {
            max_iterations: 1,
            max_rpm: 0,
        };
        let registry = RoleRegistry::from_personas(vec![
            Persona {
                key: "writer".into(),
                name: "Writer".into(),
                goal: "Write".into(),
                backstory: "".into(),
                constraints,
            },
            Persona {
                key: "editor".into(),
                name: "Editor".into(),
                goal: "Edit".into(),
                backstory: "".into(),
                constraints,
            },
        ])
        .unwrap();
        let pipeline = Pipeline::from_registry(
            &registry,
            &[("Draft a pitch for {topic}.", "A pitch"), ("Tighten it.", "A shorter pitch")],
        )
        .unwrap();

        let invoker = Arc::new(ScriptedInvoker::new());
        let orch = Orchestrator::new(pipeline, invoker.clone(), model()).unwrap();
        let report = orch.run("bikes", None, &SilentProgress).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.pipeline_len, 2);
        assert_eq!(report.agents_used, ["Writer", "Editor"]);
        assert!(invoker.payloads()[0].contains("Draft a pitch for bikes."));
        assert!(invoker.payloads()[1].contains("=== Step 1 - Writer ===\nOUT_1"));
    }

    #[tokio::test]
    async fn progress_sees_every_step_in_order() {
        #[derive(Default)]
        struct Recorder {
            events: Mutex<Vec<String>>,
        }
        impl RunProgress for Recorder {
            fn run_started(&self, _run_id: &RunId, topic: &str, _personas: &[String]) {
                self.events.lock().unwrap().push(format!("start:{topic}"));
            }
            fn step_started(&self, position: usize, total: usize, _persona: &str) {
                self.events.lock().unwrap().push(format!("step:{position}/{total}"));
            }
            fn step_finished(&self, result: &StepResult, _total: usize) {
                self.events.lock().unwrap().push(format!("done:{}", result.step_position));
            }
            fn run_finished(&self, report: &RunReport) {
                self.events.lock().unwrap().push(format!("finish:{}", report.steps.len()));
            }
        }

        let recorder = Recorder::default();
        let orch = orchestrator(Arc::new(ScriptedInvoker::failing_at(
            2,
            InvokeError::RateLimit("429".into()),
        )));
        orch.run("topic", None, &recorder).await.unwrap();

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            ["start:topic", "step:1/5", "done:1", "step:2/5", "finish:1"]
        );
    }
}
