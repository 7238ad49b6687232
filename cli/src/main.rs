//! lookalike CLI - binary entry point.
//!
//! # Architecture
//!
//! The CLI resolves configuration and run mode, then hands a Gemini-backed
//! [`BatchRunner`] to [`lookalike_engine`]:
//!
//! ```text
//! main() -> LookalikeConfig::load -> RunMode (flags | prompt) -> BatchRunner::run
//!                                                                    ^
//!                                             Ctrl-C -> CancelFlag --+
//! ```
//!
//! A Ctrl-C sets the shared [`CancelFlag`]; the runner flushes the batch in
//! flight and returns normally, so the summary is still printed.

mod args;
mod mode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{
    fs::{self, OpenOptions},
    io::{self, IsTerminal},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lookalike_engine::{
    BatchRunner, CancelFlag, CheckpointStore, GeminiClient, LookalikeConfig, PairJudge,
    RetryingJudge, RunSummary,
};

use args::{Cli, Command, RunArgs};
use mode::{RunMode, prompt_mode};

fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let mut init_warnings = Vec::new();
    let file_layer = log_file.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        Err(e) => {
            init_warnings.push(format!("Failed to open log file {}: {e}", path.display()));
            None
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(env_filter)
        .init();

    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn select_mode(args: &RunArgs) -> Result<RunMode> {
    if let Some(mode) = RunMode::from_args(args)? {
        return Ok(mode);
    }
    if !io::stdin().is_terminal() {
        bail!("no run mode given; pass --sample N or --full");
    }
    prompt_mode(&mut io::stdin().lock(), &mut io::stdout())
}

/// First Ctrl-C stops the run after saving; a second one exits at once.
fn spawn_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("Interrupt received, saving progress... (press Ctrl-C again to quit now)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Second interrupt, exiting without waiting for the save");
            std::process::exit(130);
        }
    });
}

fn print_summary(summary: &RunSummary, output: &Path) {
    if summary.interrupted {
        println!("Progress saved. You can resume later");
    } else {
        println!("Processing complete. Results saved to {}", output.display());
    }
    println!(
        "Judged {} of {} attempted pairs ({} skipped after retries); {} already done before this run",
        summary.judged, summary.attempted, summary.unresolved, summary.already_processed
    );
    println!(
        "{} rows in {}; {} of {} selected pairs still pending",
        summary.persisted_total,
        output.display(),
        summary.remaining(),
        summary.input_total
    );
}

async fn run(args: RunArgs) -> Result<()> {
    let config =
        LookalikeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let mode = select_mode(&args)?;

    let input = args.input.clone().unwrap_or_else(|| config.input_path());
    let output: PathBuf = args
        .output
        .clone()
        .unwrap_or_else(|| mode.default_output(config.output_dir()));

    let mut options = config.run_options()?;
    options.sample = mode.sample();
    options.dry_run = args.dry_run;
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if let Some(seed) = args.seed {
        options.seed = seed;
    }

    let mut policy = config.retry_policy();
    if let Some(max_attempts) = args.max_attempts {
        policy.max_attempts = max_attempts;
    }

    // A dry run never calls the service, so it does not need a key.
    let api_key = match config.api_key() {
        Ok(key) => key,
        Err(_) if options.dry_run => String::new(),
        Err(err) => return Err(err.into()),
    };
    let client = GeminiClient::with_base_url(
        api_key,
        config.model(),
        config.base_url(),
        config.timeout(),
    )
    .context("failed to build Gemini client")?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        model = client.model(),
        ?mode,
        "Starting run"
    );

    let cancel = CancelFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let judge = PairJudge::new(client).with_temperature(config.temperature()?);
    let runner = BatchRunner::new(
        RetryingJudge::new(judge, policy, cancel.clone()),
        CheckpointStore::new(&output),
        options,
        cancel,
    );

    let summary = runner
        .run(&input)
        .await
        .with_context(|| format!("run failed for {}", input.display()))?;
    print_summary(&summary, &output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref());

    match cli.cmd {
        Command::Run(args) => run(args).await,
    }
}
