use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::{Claude, Completion, Gemini};
use painpoint_common::{FileConfig, Provider, Secrets};
use painpoint_triage::aggregator::write_report;
use painpoint_triage::batcher::Batcher;
use painpoint_triage::filter::RelevanceFilter;
use painpoint_triage::ingest::{ensure_writable, read_comments};
use painpoint_triage::{load_failed_batches, CsvDeadLetter, LlmClassifier, Pipeline, RunOutcome};

#[derive(Parser)]
#[command(name = "painpoint-triage", about = "Keyword triage and LLM pain-point classification of public comments")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, global = true, default_value = "painpoint.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Triage, classify and write the report
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        failed: Option<PathBuf>,
    },
    /// Re-classify batches recorded in the dead-letter file
    Retry {
        #[arg(long)]
        failed: Option<PathBuf>,
        /// Defaults to `<output>.retry.csv`
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run only the keyword filter and print what survives
    Triage {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("painpoint=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = FileConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    info!(config = %cli.config.display(), "Config loaded");

    match cli.command {
        Command::Run {
            input,
            output,
            failed,
        } => {
            let input = input.unwrap_or_else(|| config.paths.input.clone());
            let output = output.unwrap_or_else(|| config.paths.output.clone());
            let failed = failed.unwrap_or_else(|| config.paths.failed_batches.clone());
            run(&config, &input, &output, &failed).await
        }
        Command::Retry { failed, output } => {
            let failed = failed.unwrap_or_else(|| config.paths.failed_batches.clone());
            let output = output.unwrap_or_else(|| retry_path(&config.paths.output));
            retry(&config, &failed, &output).await
        }
        Command::Triage { input } => {
            let input = input.unwrap_or_else(|| config.paths.input.clone());
            triage(&config, &input)
        }
    }
}

async fn run(config: &FileConfig, input: &Path, output: &Path, failed: &Path) -> Result<()> {
    let secrets = Secrets::from_env(config.classifier.provider)?;
    let comments = read_comments(input).context("Failed to read input comments")?;
    ensure_writable(output).context("Report path is not writable")?;
    ensure_writable(failed).context("Dead-letter path is not writable")?;

    let pipeline = build_pipeline(config, &secrets, failed);
    let outcome = pipeline.run(comments).await;
    if outcome.empty {
        info!(input = %input.display(), "No comments survived triage; writing an empty report");
    }

    finish(outcome, output, failed)
}

async fn retry(config: &FileConfig, failed: &Path, output: &Path) -> Result<()> {
    let batches = load_failed_batches(failed).context("Failed to read dead-letter file")?;
    if batches.is_empty() {
        info!(failed = %failed.display(), "Nothing to retry");
        return Ok(());
    }

    let secrets = Secrets::from_env(config.classifier.provider)?;
    let retry_failed = retry_path(failed);
    ensure_writable(output).context("Report path is not writable")?;
    ensure_writable(&retry_failed).context("Dead-letter path is not writable")?;

    info!(batches = batches.len(), "Retrying failed batches");
    let pipeline = build_pipeline(config, &secrets, &retry_failed);
    let outcome = pipeline.retry(batches).await;

    finish(outcome, output, &retry_failed)
}

fn triage(config: &FileConfig, input: &Path) -> Result<()> {
    let comments = read_comments(input).context("Failed to read input comments")?;
    let filter = RelevanceFilter::new(&config.triage);
    let (relevant, counts) = filter.relevant(comments);

    println!("\n=== Triage Dry Run ===");
    println!("Keywords:           {}", filter.keyword_count());
    println!("Comments read:      {}", counts.total);
    println!("Empty:              {}", counts.empty);
    println!("Placeholder:        {}", counts.placeholder);
    println!("Excluded author:    {}", counts.excluded_author);
    println!("Too long:           {}", counts.too_long);
    println!("No keyword:         {}", counts.no_keyword);
    println!("Relevant:           {}", counts.relevant);
    let batcher = Batcher::new(config.batching.batch_size);
    println!(
        "Batches of {}:       {}",
        batcher.size(),
        batcher.batch_count(relevant.len())
    );
    Ok(())
}

fn build_pipeline(config: &FileConfig, secrets: &Secrets, failed: &Path) -> Pipeline {
    let timeout = config.batching.call_timeout();
    let backend: Arc<dyn Completion> = match config.classifier.provider {
        Provider::Gemini => Arc::new(
            Gemini::new(&secrets.api_key, &config.classifier.model).with_timeout(timeout),
        ),
        Provider::Claude => Arc::new(
            Claude::new(&secrets.api_key, &config.classifier.model).with_timeout(timeout),
        ),
    };
    info!(
        provider = backend.provider(),
        model = backend.model(),
        batch_size = config.batching.batch_size,
        inter_batch_delay_secs = config.batching.inter_batch_delay_secs,
        max_in_flight = config.batching.max_in_flight,
        "Classifier ready"
    );

    let classifier = Arc::new(LlmClassifier::new(backend, &config.classifier, timeout));
    let dead_letter = Arc::new(CsvDeadLetter::new(failed));

    Pipeline::new(&config.triage, &config.batching, classifier, dead_letter)
        .with_interrupt(interrupt_on_ctrl_c())
}

/// Flips to `true` on the first Ctrl-C.
fn interrupt_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight batches");
            let _ = tx.send(true);
            // Keep the sender alive so receivers do not see a closed channel.
            std::future::pending::<()>().await;
        }
    });
    rx
}

fn finish(outcome: RunOutcome, output: &Path, failed: &Path) -> Result<()> {
    write_report(output, &outcome.rows).context("Failed to write report")?;

    if !outcome.failed.is_empty() {
        warn!(
            batches = outcome.failed.len(),
            path = %failed.display(),
            "Some batches failed; re-run them with `painpoint-triage retry`"
        );
    }
    println!("{}", outcome.stats);
    Ok(())
}

/// `data/failed.csv` -> `data/failed.retry.csv`
fn retry_path(path: &Path) -> PathBuf {
    path.with_extension("retry.csv")
}
