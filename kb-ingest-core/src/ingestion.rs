//! # ingestion: start a knowledge-base ingestion job and wait for it
//!
//! [`start_ingestion`] issues exactly one start call. [`poll_until_terminal`]
//! then queries the job on a fixed interval until the service reports
//! COMPLETE, FAILED or STOPPED. There is no backoff and no jitter; the only
//! ways out of a job that never finishes are the cancellation token and the
//! optional `max_wait` in [`PollOptions`].

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::contract::{
    ClientError, IngestionJob, IngestionJobStatus, IngestionService, IngestionStatistics, Sleeper,
};

pub const DEFAULT_DESCRIPTION: &str = "First Ingestion";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Shorter intervals are raised to this, so a zero interval cannot spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that end polling before the job reached a terminal state.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("failed to query status of ingestion job {job_id}")]
    Status {
        job_id: String,
        #[source]
        source: ClientError,
    },

    #[error("ingestion job {job_id} still {last_status} after waiting {waited:?}")]
    TimedOut {
        job_id: String,
        last_status: IngestionJobStatus,
        waited: Duration,
    },

    #[error("polling of ingestion job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Upper bound on total time spent sleeping between polls. `None` polls
    /// until the job ends.
    pub max_wait: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum JobOutcome {
    Complete {
        statistics: Option<IngestionStatistics>,
    },
    Failed {
        reasons: Vec<String>,
    },
    /// Neither success nor failure.
    Stopped,
}

impl JobOutcome {
    fn from_terminal(job: &IngestionJob) -> Option<Self> {
        match job.status {
            IngestionJobStatus::Complete => Some(JobOutcome::Complete {
                statistics: job.statistics.clone(),
            }),
            IngestionJobStatus::Failed => Some(JobOutcome::Failed {
                reasons: job.failure_reasons.clone(),
            }),
            IngestionJobStatus::Stopped => Some(JobOutcome::Stopped),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Complete { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    pub fn status(&self) -> IngestionJobStatus {
        match self {
            JobOutcome::Complete { .. } => IngestionJobStatus::Complete,
            JobOutcome::Failed { .. } => IngestionJobStatus::Failed,
            JobOutcome::Stopped => IngestionJobStatus::Stopped,
        }
    }

    /// Console lines describing the outcome, failure reasons included verbatim.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Final ingestion job status: {}", self.status())];
        match self {
            JobOutcome::Complete { statistics } => {
                lines.push("Ingestion job completed successfully.".to_string());
                if let Some(stats) = statistics {
                    lines.push(format!(
                        "Documents scanned: {}, new: {}, modified: {}, deleted: {}, failed: {}",
                        stats.documents_scanned,
                        stats.new_documents_indexed,
                        stats.modified_documents_indexed,
                        stats.documents_deleted,
                        stats.documents_failed
                    ));
                }
            }
            JobOutcome::Failed { reasons } => {
                lines.push("Ingestion job failed.".to_string());
                lines.push("Failure reasons:".to_string());
                lines.extend(reasons.iter().map(|reason| format!("- {reason}")));
            }
            JobOutcome::Stopped => lines.push("Ingestion job stopped.".to_string()),
        }
        lines
    }
}

/// What polling observed.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub job_id: String,
    pub outcome: JobOutcome,
    /// Number of status queries issued, the terminal one included.
    pub polls: u32,
    pub sleeps: u32,
}

/// Start one ingestion job. No retry; errors go straight back to the caller.
pub async fn start_ingestion<I>(
    service: &I,
    knowledge_base_id: &str,
    data_source_id: &str,
    description: &str,
) -> Result<IngestionJob, ClientError>
where
    I: IngestionService + ?Sized,
{
    info!(knowledge_base_id, data_source_id, description, "Starting ingestion job");
    match service
        .start_ingestion_job(knowledge_base_id, data_source_id, description)
        .await
    {
        Ok(job) => {
            info!(job_id = %job.ingestion_job_id, status = %job.status, "Ingestion job started");
            Ok(job)
        }
        Err(e) => {
            error!(error = %e, knowledge_base_id, data_source_id, "Failed to start ingestion job");
            Err(e)
        }
    }
}

/// Query the job every `options.interval` until it reaches a terminal status.
pub async fn poll_until_terminal<I, S>(
    service: &I,
    sleeper: &S,
    knowledge_base_id: &str,
    data_source_id: &str,
    job_id: &str,
    options: &PollOptions,
    cancel: &CancellationToken,
) -> Result<PollReport, PollError>
where
    I: IngestionService + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut polls: u32 = 0;
    let mut sleeps: u32 = 0;
    let mut waited = Duration::ZERO;
    let interval = options.interval.max(MIN_POLL_INTERVAL);
    if interval != options.interval {
        warn!(job_id, requested = ?options.interval, ?interval, "Poll interval raised to the minimum");
    }

    loop {
        let job = service
            .get_ingestion_job(knowledge_base_id, data_source_id, job_id)
            .await
            .map_err(|source| {
                error!(job_id, error = %source, "Failed to query ingestion job status");
                PollError::Status {
                    job_id: job_id.to_string(),
                    source,
                }
            })?;
        polls += 1;

        if let Some(outcome) = JobOutcome::from_terminal(&job) {
            info!(job_id, status = %job.status, polls, "Ingestion job reached a terminal status");
            return Ok(PollReport {
                job_id: job_id.to_string(),
                outcome,
                polls,
                sleeps,
            });
        }

        if let Some(max_wait) = options.max_wait {
            if waited + interval > max_wait {
                warn!(job_id, status = %job.status, ?waited, "Gave up waiting for ingestion job");
                return Err(PollError::TimedOut {
                    job_id: job_id.to_string(),
                    last_status: job.status,
                    waited,
                });
            }
        }

        info!(
            job_id,
            status = %job.status,
            attempt = polls,
            "Ingestion job status: {} (Checking again in {} seconds)",
            job.status,
            interval.as_secs()
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(job_id, "Polling cancelled");
                return Err(PollError::Cancelled { job_id: job_id.to_string() });
            }
            _ = sleeper.sleep(interval) => {}
        }
        sleeps += 1;
        waited += interval;
    }
}
