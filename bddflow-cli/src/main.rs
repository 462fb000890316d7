//! `bddflow` command line interface.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use bddflow::cancellation::CancellationToken;
use bddflow::capability::GeminiClient;
use bddflow::config::PipelineConfig;
use bddflow::core::{EventStatus, PipelineEvent, RunStatus};
use bddflow::events::ChannelEventSink;
use bddflow::executor::GenerativeExecutor;
use bddflow::extract::extract_text;
use bddflow::observability::{init_tracing, LogFormat};
use bddflow::pipeline::{bdd_pipeline, PipelineDefinition, PipelineRun, PipelineRunner};
use bddflow::sink::{FileResultSink, ResultSink};

/// Minimum narrative length the CLI accepts unless configured otherwise.
const CLI_MIN_INPUT_CHARS: usize = 50;

/// Bddflow - turns a business narrative into scenarios, code and a review
#[derive(Parser)]
#[command(name = "bddflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on a narrative
    Run(RunArgs),

    /// List the pipeline stages in execution order
    Stages,

    /// Print the text extracted from a document
    Extract {
        /// Path to a .txt, .docx or .pdf file
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Read the narrative from a .txt, .docx or .pdf file
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    input: Option<PathBuf>,

    /// Narrative text
    #[arg(long)]
    text: Option<String>,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Per-stage timeout in seconds
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Maximum number of stages running at once
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Stop scheduling after the first failed stage
    #[arg(long)]
    fail_fast: bool,

    /// Minimum narrative length in characters (default: 50)
    #[arg(long)]
    min_chars: Option<usize>,

    /// Root directory for run artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not write artifacts
    #[arg(long)]
    no_save: bool,
}

impl RunArgs {
    /// Layers file, environment and flags, later ones winning.
    fn load_config(&self) -> Result<PipelineConfig> {
        let base = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("failed to load config: {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        let mut config = base
            .merge_env(|key| std::env::var(key).ok())
            .context("invalid environment configuration")?;

        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(secs) = self.timeout_secs {
            config.stage_timeout_secs = Some(secs);
        }
        if let Some(n) = self.max_concurrency {
            config.max_concurrency = n;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        config.min_input_chars = match self.min_chars {
            Some(n) => n,
            None if config.min_input_chars == PipelineConfig::default().min_input_chars => {
                CLI_MIN_INPUT_CHARS
            }
            None => config.min_input_chars,
        };
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        config.validate().context("invalid run options")
    }

    fn narrative(&self) -> Result<String> {
        match (&self.input, &self.text) {
            (Some(path), _) => extract_text(path)
                .with_context(|| format!("failed to read input: {}", path.display())),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => bail!("either --input or --text is required"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_tracing(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Stages => {
            print_stages(&bdd_pipeline()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Extract { file } => {
            let text = extract_text(&file)
                .with_context(|| format!("failed to extract: {}", file.display()))?;
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_stages(definition: &PipelineDefinition) {
    for (i, stage) in definition.stages().iter().enumerate() {
        let deps = if stage.dependencies.is_empty() {
            "input".to_string()
        } else {
            stage.dependencies.join(", ")
        };
        println!(
            "{}. {:<14} {:<22} <- {:<14} -> {}",
            i + 1,
            stage.id,
            stage.display_title(),
            deps,
            stage.artifact_file_name()
        );
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let config = args.load_config()?;
    let narrative = args.narrative()?;
    info!(chars = narrative.chars().count(), model = %config.model, "Starting pipeline");

    let capability = Arc::new(GeminiClient::new(config.api_key.clone()));
    let executor = GenerativeExecutor::new(capability)
        .with_options(config.generation_options())
        .with_retry(config.retry.clone());

    let (events, rx) = ChannelEventSink::new();
    let runner = PipelineRunner::new(bdd_pipeline()?, Arc::new(executor))
        .with_event_sink(Arc::new(events))
        .with_config(config.runner_config());

    let progress = tokio::spawn(print_progress(rx));

    let token = Arc::new(CancellationToken::new());
    let ctrl_c = {
        let token = Arc::clone(&token);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                token.cancel("interrupted by user");
            }
        })
    };

    let result = runner.run_with_cancellation(&narrative, token).await;
    ctrl_c.abort();

    let definition = runner.definition().clone();
    // Dropping the runner closes the event channel and ends the printer.
    drop(runner);
    let _ = progress.await;

    let run = result.context("pipeline could not start")?;
    print_summary(&run);

    if !args.no_save {
        let sink = FileResultSink::new(&config.output_dir);
        let receipt = sink
            .persist(&run, &definition)
            .await
            .context("failed to save run")?;
        if let Some(dir) = receipt.location {
            eprintln!("Saved {} files to {}", receipt.files.len(), dir.display());
        }
    }

    Ok(if run.status == RunStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn print_progress(mut rx: UnboundedReceiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        eprintln!("{}", progress_line(&event));
    }
}

fn progress_line(event: &PipelineEvent) -> String {
    let subject = match (&event.status, &event.stage_id) {
        (EventStatus::Stage(status), Some(stage)) => format!("[{stage}] {status}"),
        (EventStatus::Stage(status), None) => format!("[?] {status}"),
        (EventStatus::Run(status), _) => format!("run {status}"),
    };
    match &event.detail {
        Some(detail) => format!("{subject}: {detail}"),
        None => subject,
    }
}

fn print_summary(run: &PipelineRun) {
    let summary = run.summary();
    eprintln!(
        "Run {} {}: {}/{} stages succeeded",
        run.run_id, run.status, summary.succeeded, summary.total
    );
    if let Some(reason) = &run.cancellation_reason {
        eprintln!("Cancelled: {reason}");
    }
    for failure in &summary.failures {
        eprintln!("  {} failed ({}): {}", failure.stage, failure.kind, failure.message);
    }
    if let Ok(json) = serde_json::to_string(&run.statuses()) {
        info!(run_id = %run.run_id, statuses = %json, "Run finished");
    }
}
