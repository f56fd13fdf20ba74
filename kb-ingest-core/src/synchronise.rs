//! High-level pipeline: upload → settle → start ingestion → poll.
//!
//! [`synchronise`] runs the steps strictly in order on the caller's task.
//! Upload failures of individual files are recorded in the report and never
//! abort the run; every other failure ends it with a [`SynchroniseError`].
//!
//! All remote access goes through the [`contract`](crate::contract) traits,
//! so the same function drives the real AWS clients from the CLI and mocks
//! from the tests.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::DeploymentOutputs;
use crate::contract::{ClientError, IngestionService, ObjectStorage, Sleeper};
use crate::ingestion::{
    poll_until_terminal, start_ingestion, PollError, PollOptions, PollReport, DEFAULT_DESCRIPTION,
};
use crate::upload::{upload_directory, UploadError, UploadReport};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Everything one run needs besides its clients.
#[derive(Debug, Clone)]
pub struct SynchroniseConfig {
    pub outputs: DeploymentOutputs,
    pub data_dir: PathBuf,
    pub description: String,
    /// Pause between the last upload and starting the job.
    pub settle_delay: Duration,
    pub poll: PollOptions,
}

impl SynchroniseConfig {
    pub fn new(outputs: DeploymentOutputs, data_dir: PathBuf) -> Self {
        Self {
            outputs,
            data_dir,
            description: DEFAULT_DESCRIPTION.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            poll: PollOptions::default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SynchroniseReport {
    pub upload: UploadReport,
    pub job_id: String,
    pub poll: PollReport,
}

#[derive(Debug, thiserror::Error)]
pub enum SynchroniseError {
    #[error("failed to read data directory {path:?}")]
    ReadDataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cancelled while uploading; `upload` holds what was attempted.
    #[error("cancelled while uploading, {remaining} entries not attempted")]
    UploadCancelled {
        upload: UploadReport,
        remaining: usize,
    },

    #[error("failed to start ingestion job")]
    StartJob(#[source] ClientError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("cancelled before the ingestion job was started")]
    Cancelled,
}

pub async fn synchronise<S, I, Z>(
    config: &SynchroniseConfig,
    storage: &S,
    ingestion: &I,
    sleeper: &Z,
    cancel: &CancellationToken,
) -> Result<SynchroniseReport, SynchroniseError>
where
    S: ObjectStorage + ?Sized,
    I: IngestionService + ?Sized,
    Z: Sleeper + ?Sized,
{
    info!("[SYNC] Starting ingestion pipeline");

    // --- Step 1: Upload ---
    let upload = upload_directory(
        storage,
        &config.outputs.resume_bucket_name,
        &config.data_dir,
        cancel,
    )
    .await
    .map_err(|e| match e {
        UploadError::ReadDir { path, source } => SynchroniseError::ReadDataDir { path, source },
        UploadError::Cancelled { partial, remaining } => {
            warn!(remaining, "[SYNC] Cancelled during upload");
            SynchroniseError::UploadCancelled {
                upload: partial,
                remaining,
            }
        }
    })?;
    if !upload.all_succeeded() {
        warn!(
            failed = upload.failed().count(),
            "[SYNC] Some files failed to upload, continuing with ingestion"
        );
    }

    // --- Step 2: Let the bucket settle ---
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("[SYNC] Cancelled before starting ingestion job");
            return Err(SynchroniseError::Cancelled);
        }
        _ = sleeper.sleep(config.settle_delay) => {}
    }

    // --- Step 3: Start ingestion ---
    let job = start_ingestion(
        ingestion,
        &config.outputs.knowledge_base_id,
        &config.outputs.data_source_id,
        &config.description,
    )
    .await
    .map_err(SynchroniseError::StartJob)?;

    // --- Step 4: Poll ---
    let poll = match poll_until_terminal(
        ingestion,
        sleeper,
        &config.outputs.knowledge_base_id,
        &config.outputs.data_source_id,
        &job.ingestion_job_id,
        &config.poll,
        cancel,
    )
    .await
    {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "[SYNC][ERROR] Polling failed");
            return Err(e.into());
        }
    };

    info!(
        job_id = %job.ingestion_job_id,
        status = %poll.outcome.status(),
        "[SYNC] Ingestion pipeline finished"
    );

    Ok(SynchroniseReport {
        upload,
        job_id: job.ingestion_job_id,
        poll,
    })
}
