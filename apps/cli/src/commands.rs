//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Section;
use color_eyre::eyre::{Report, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use brainstorm_artifacts::{FileReportSink, ReportSink};
use brainstorm_core::{
    HttpModelInvoker, Orchestrator, Pipeline, RoleRegistry, RunProgress, TEMPLATES, TopicSource,
    cancel_pair,
};
use brainstorm_shared::{
    AppConfig, ModelConfig, ModelOverrides, PersonaConstraints, RunId, RunReport, SUPPORTED_MODELS,
    StepResult, config_file_path, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Brainstorm: a team of AI personas works through a topic, one after another.
#[derive(Parser)]
#[command(
    name = "brainstorm",
    version,
    about = "Run a sequential multi-persona brainstorm against an OpenAI-compatible model.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run a brainstorm on a topic or a built-in template.
    Run {
        /// Custom topic. Overrides --template.
        #[arg(long, conflicts_with = "template")]
        topic: Option<String>,

        /// Additional context for a custom topic.
        #[arg(long, requires = "topic")]
        context: Option<String>,

        /// Built-in template (see `brainstorm templates`). Defaults to the configured one.
        #[arg(long)]
        template: Option<String>,

        /// Model identifier (see `brainstorm models`).
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature, 0.0 to 1.0.
        #[arg(long)]
        temperature: Option<f64>,

        /// Nucleus sampling cutoff, 0.0 to 1.0.
        #[arg(long)]
        top_p: Option<f64>,

        /// OpenAI-compatible API root.
        #[arg(long)]
        base_url: Option<String>,

        /// Directory for report files (defaults to the configured results dir).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List built-in topic templates.
    Templates,

    /// List the personas in pipeline order.
    Roles,

    /// List supported models.
    Models,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "brainstorm=info",
        1 => "brainstorm=debug",
        _ => "brainstorm=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            topic,
            context,
            template,
            model,
            temperature,
            top_p,
            base_url,
            out,
        } => {
            let overrides = ModelOverrides {
                api_key: None,
                model_id: model,
                temperature,
                top_p,
                base_url,
            };
            cmd_run(topic, context, template, overrides, out).await
        }
        Command::Templates => cmd_templates(),
        Command::Roles => cmd_roles(),
        Command::Models => cmd_models(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(
    topic: Option<String>,
    context: Option<String>,
    template: Option<String>,
    overrides: ModelOverrides,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;

    let source = match (topic, template) {
        (Some(topic), _) => TopicSource::Explicit { topic, context },
        (None, Some(name)) => TopicSource::Template(name),
        (None, None) => TopicSource::Template(config.defaults.template.clone()),
    };
    let (topic, context) = source.resolve()?;

    // Fail fast on bad config before anything is printed as "running".
    let model = ModelConfig::resolve(&overrides, &config)?;
    let registry = RoleRegistry::builtin(PersonaConstraints::from(&config));
    let pipeline = Pipeline::brainstorm(&registry)?;
    let orchestrator = Orchestrator::new(pipeline, Arc::new(HttpModelInvoker::new()?), model)?;

    let results_dir = out.unwrap_or_else(|| PathBuf::from(&config.defaults.results_dir));
    print_run_config(&topic, context.as_deref(), &orchestrator, &config);

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping the run");
            cancel.cancel();
        }
    });

    let progress = CliProgress::new();
    let report = orchestrator
        .run_until_cancelled(&topic, context.as_deref(), &progress, signal)
        .await?;

    // Partial reports are saved too, so completed steps are never lost.
    let saved = FileReportSink::new(&results_dir).persist(&report)?;
    print_summary(&report);
    println!("  Report:   {}", saved.json_path.display());
    println!("  Readable: {}", saved.readable_path.display());
    println!();

    if let Err(err) = report.into_result() {
        return Err(Report::new(err)
            .suggestion(format!(
                "check that {} is set and valid",
                config.model.api_key_env
            ))
            .suggestion("check connectivity to the model endpoint")
            .suggestion("completed steps are kept in the saved report"));
    }

    info!(dir = %results_dir.display(), "brainstorm complete");
    Ok(())
}

fn print_run_config(topic: &str, context: Option<&str>, orch: &Orchestrator, config: &AppConfig) {
    let model = orch.model();
    println!();
    println!("  Topic:       {topic}");
    if let Some(context) = context {
        println!("  Context:     {context}");
    }
    println!("  Model:       {}", model.model_id);
    println!("  Temperature: {}", model.temperature);
    if let Some(top_p) = model.top_p {
        println!("  Top-p:       {top_p}");
    }
    println!("  Endpoint:    {}", model.base_url);
    println!(
        "  Limits:      {} rpm, {} iterations per persona",
        config.defaults.max_rpm, config.defaults.max_iterations
    );
    println!("  Team:        {}", orch.pipeline().persona_names().join(" -> "));
    println!();
}

fn print_summary(report: &RunReport) {
    let usage = &report.aggregate_usage;
    println!();
    match report.failure_reason() {
        None => println!("  Brainstorm completed!"),
        Some(reason) => println!("  Brainstorm stopped: {reason}"),
    }
    println!("  Run:      {}", report.run_id);
    println!("  Steps:    {}/{}", report.steps.len(), report.pipeline_len);
    println!(
        "  Tokens:   {} total ({} prompt, {} completion)",
        usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
    );
    println!(
        "  Time:     {:.1}s",
        (report.completed_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl RunProgress for CliProgress {
    fn run_started(&self, run_id: &RunId, _topic: &str, personas: &[String]) {
        self.spinner.set_message(format!(
            "Run {} with {} personas",
            run_id.short(),
            personas.len()
        ));
    }

    fn step_started(&self, position: usize, total: usize, persona: &str) {
        self.spinner
            .set_message(format!("[{position}/{total}] {persona} is thinking"));
    }

    fn step_finished(&self, result: &StepResult, total: usize) {
        self.spinner.println(format!(
            "  done [{}/{total}] {} ({} tokens)",
            result.step_position, result.persona_name, result.token_usage.total_tokens
        ));
    }

    fn run_finished(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

fn cmd_templates() -> Result<()> {
    for t in TEMPLATES {
        println!("{}", t.name);
        println!("  topic:   {}", t.topic);
        println!("  context: {}", t.context);
    }
    Ok(())
}

fn cmd_roles() -> Result<()> {
    let config = load_config()?;
    let registry = RoleRegistry::builtin(PersonaConstraints::from(&config));
    let pipeline = Pipeline::brainstorm(&registry)?;

    for step in pipeline.steps() {
        let persona = &step.persona;
        println!("{}. {} ({})", step.position, persona.name, persona.key);
        println!("   goal:   {}", persona.goal);
        println!("   output: {}", step.expected_output_hint);
        println!(
            "   limits: {} rpm, {} iterations",
            persona.constraints.max_rpm, persona.constraints.max_iterations
        );
    }
    Ok(())
}

fn cmd_models() -> Result<()> {
    let config = load_config()?;
    for model in SUPPORTED_MODELS {
        let marker = if *model == config.model.model_id { " (default)" } else { "" };
        println!("{model}{marker}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let path = config_file_path()?;
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;

    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, showing defaults)", path.display());
    }
    println!("{toml_str}");

    let key_env = &config.model.api_key_env;
    let key_state = match std::env::var(key_env) {
        Ok(v) if !v.trim().is_empty() => "set",
        _ => "not set",
    };
    println!("# {key_env}: {key_state}");
    Ok(())
}
