//! # contract: capability traits and the data they exchange
//!
//! Every remote side effect of the pipeline goes through one of the traits in
//! this module:
//! - [`ObjectStorage`] puts a local file into a bucket under a key.
//! - [`IngestionService`] starts and inspects knowledge-base ingestion jobs.
//! - [`Sleeper`] suspends between polls, so tests can run many iterations
//!   without waiting in real time.
//!
//! The binary crate wires real AWS clients behind these traits. Tests use the
//! `mockall` mocks generated here (`MockObjectStorage`, `MockIngestionService`,
//! `MockSleeper`), exported when the `test-export-mocks` feature is enabled.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;

/// Error returned by capability implementations. Transport and service
/// errors are boxed as-is; callers only log or propagate them.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Lifecycle state of an ingestion job as reported by the ingestion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IngestionJobStatus {
    Starting,
    InProgress,
    Stopping,
    Complete,
    Failed,
    Stopped,
    /// A status string this version does not know about. Never terminal.
    Unknown(String),
}

impl IngestionJobStatus {
    /// COMPLETE, FAILED and STOPPED end the job; everything else keeps polling.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IngestionJobStatus::Complete | IngestionJobStatus::Failed | IngestionJobStatus::Stopped
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            IngestionJobStatus::Starting => "STARTING",
            IngestionJobStatus::InProgress => "IN_PROGRESS",
            IngestionJobStatus::Stopping => "STOPPING",
            IngestionJobStatus::Complete => "COMPLETE",
            IngestionJobStatus::Failed => "FAILED",
            IngestionJobStatus::Stopped => "STOPPED",
            IngestionJobStatus::Unknown(other) => other,
        }
    }
}

impl From<&str> for IngestionJobStatus {
    fn from(s: &str) -> Self {
        match s {
            "STARTING" => IngestionJobStatus::Starting,
            "IN_PROGRESS" => IngestionJobStatus::InProgress,
            "STOPPING" => IngestionJobStatus::Stopping,
            "COMPLETE" => IngestionJobStatus::Complete,
            "FAILED" => IngestionJobStatus::Failed,
            "STOPPED" => IngestionJobStatus::Stopped,
            other => {
                tracing::warn!(status = other, "Unrecognised ingestion job status");
                IngestionJobStatus::Unknown(other.to_string())
            }
        }
    }
}

impl std::fmt::Display for IngestionJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document counters the ingestion service reports for a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionStatistics {
    pub documents_scanned: i64,
    pub new_documents_indexed: i64,
    pub modified_documents_indexed: i64,
    pub documents_deleted: i64,
    pub documents_failed: i64,
}

/// Snapshot of a remote ingestion job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionJob {
    pub ingestion_job_id: String,
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub status: IngestionJobStatus,
    /// Populated by the service when the job failed.
    pub failure_reasons: Vec<String>,
    pub statistics: Option<IngestionStatistics>,
}

/// Puts local files into a bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload the file at `path` to `bucket` under `key`, overwriting any
    /// existing object with the same key.
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), ClientError>;
}

/// Starts and inspects ingestion jobs of a knowledge base.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IngestionService: Send + Sync {
    /// Start a new ingestion job for the data source. Returns the job as the
    /// service created it, including its assigned id.
    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        description: &str,
    ) -> Result<IngestionJob, ClientError>;

    /// Fetch the current state of an existing job.
    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob, ClientError>;
}

/// Suspends the current task. Production code uses [`TokioSleeper`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(IngestionJobStatus::Complete.is_terminal());
        assert!(IngestionJobStatus::Failed.is_terminal());
        assert!(IngestionJobStatus::Stopped.is_terminal());
        assert!(!IngestionJobStatus::InProgress.is_terminal());
        assert!(!IngestionJobStatus::Starting.is_terminal());
        assert!(!IngestionJobStatus::Stopping.is_terminal());
    }

    #[test]
    fn unknown_status_is_kept_verbatim_and_not_terminal() {
        let status = IngestionJobStatus::from("QUEUED_FOR_LATER");
        assert_eq!(status, IngestionJobStatus::Unknown("QUEUED_FOR_LATER".to_string()));
        assert_eq!(status.as_str(), "QUEUED_FOR_LATER");
        assert!(!status.is_terminal());
    }

    #[test]
    fn wire_strings_parse_back_to_the_same_status() {
        for wire in ["STARTING", "IN_PROGRESS", "STOPPING", "COMPLETE", "FAILED", "STOPPED"] {
            assert_eq!(IngestionJobStatus::from(wire).to_string(), wire);
        }
    }
}
