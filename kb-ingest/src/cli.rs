///
/// This module implements the CLI interface for kb-ingest: command parsing,
/// wiring of the AWS clients into the core pipeline, and user-visible reporting.
///
/// All pipeline logic (upload, job start, polling) lives in the [`kb-ingest-core`] crate.
/// This module is strictly glue: flags, client construction, and console output.
///
/// ## How To Use
/// - From a deployment pipeline: `kb-ingest ingest` after the stack deployed and wrote `outputs.json`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`kb-ingest-core`]: ../../kb-ingest-core/
use crate::aws::{load_sdk_config, BedrockIngestion, S3Storage};
use crate::load_config::load_config;
use anyhow::Result;
use clap::{Parser, Subcommand};
use kb_ingest_core::contract::TokioSleeper;
use kb_ingest_core::ingestion::{PollOptions, DEFAULT_DESCRIPTION};
use kb_ingest_core::synchronise::{synchronise, SynchroniseConfig, SynchroniseReport};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// CLI for kb-ingest: refresh a knowledge base from a local directory.
#[derive(Parser)]
#[clap(
    name = "kb-ingest",
    version,
    about = "Upload local files to the knowledge-base bucket and run an ingestion job"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the data directory, start an ingestion job and wait for it to finish
    Ingest(IngestArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct IngestArgs {
    /// Path to the deployment outputs JSON
    #[clap(long, env = "KB_INGEST_OUTPUTS", default_value = "src/outputs.json")]
    pub outputs: PathBuf,

    /// Stack to read outputs from (defaults to the first stack in the file)
    #[clap(long)]
    pub stack: Option<String>,

    /// Directory whose files are uploaded (not recursive)
    #[clap(long, env = "KB_INGEST_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Region of the knowledge base
    #[clap(long, env = "KB_INGEST_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Description attached to the ingestion job
    #[clap(long, default_value = DEFAULT_DESCRIPTION)]
    pub description: String,

    #[clap(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: u64,

    /// Pause between the last upload and starting the job
    #[clap(long, default_value_t = 2)]
    pub settle_delay_secs: u64,

    /// Give up if the job is still running after this many seconds of waiting
    #[clap(long)]
    pub max_wait_secs: Option<u64>,

    /// Exit non-zero if any upload failed or the job did not complete
    #[clap(long)]
    pub strict: bool,
}

impl IngestArgs {
    fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        }
    }
}

/// Console lines summarising a finished run. Per-file results are already
/// logged as each upload happens, so only the counts are repeated here.
pub fn report_lines(report: &SynchroniseReport) -> Vec<String> {
    let upload = &report.upload;
    let mut lines = vec![format!(
        "Uploaded {} of {} file(s) to {} ({} failed)",
        upload.uploaded().count(),
        upload.outcomes.len(),
        upload.bucket,
        upload.failed().count()
    )];
    lines.push(format!("Ingestion job: {}", report.job_id));
    lines.extend(report.poll.outcome.report_lines());
    lines
}

/// Reason a `--strict` run should exit non-zero, if any.
pub fn strict_failure(report: &SynchroniseReport) -> Option<String> {
    if report.upload.all_succeeded() && report.poll.outcome.is_success() {
        return None;
    }
    Some(format!(
        "Ingestion run not fully successful: {} upload(s) failed, job status {}",
        report.upload.failed().count(),
        report.poll.outcome.status()
    ))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Ingest(args) => {
            // Config errors must surface before anything is uploaded.
            let loaded = load_config(&args.outputs, args.stack.as_deref())?;
            tracing::info!(command = "ingest", stack = %loaded.stack_name, "Starting ingestion run");

            let sdk_config = load_sdk_config().await;
            let storage = S3Storage::new(&sdk_config);
            let ingestion = BedrockIngestion::new(&sdk_config, &args.region);

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, cancelling");
                    on_ctrl_c.cancel();
                }
            });

            let config = SynchroniseConfig {
                outputs: loaded.outputs,
                data_dir: args.data_dir.clone(),
                description: args.description.clone(),
                settle_delay: Duration::from_secs(args.settle_delay_secs),
                poll: args.poll_options(),
            };

            let report = match synchronise(&config, &storage, &ingestion, &TokioSleeper, &cancel)
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "ingest", error = %e, "Ingestion run failed");
                    return Err(anyhow::Error::new(e));
                }
            };

            for line in report_lines(&report) {
                println!("{line}");
            }

            if args.strict {
                if let Some(reason) = strict_failure(&report) {
                    anyhow::bail!(reason);
                }
            }
            Ok(())
        }
    }
}
