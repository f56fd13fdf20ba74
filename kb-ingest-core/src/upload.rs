//! # upload: push a local data directory into a bucket
//!
//! Every immediate entry of the directory is uploaded under its bare file
//! name. Subdirectories are not descended into, and two runs with the same
//! file name overwrite the same object.
//!
//! Entries are attempted one after another and independently: a failed
//! upload is logged, recorded in the [`UploadReport`], and the next entry is
//! still attempted. Entries that cannot be read, or whose names are not valid
//! UTF-8 and so cannot become a key, are recorded as failed without an upload.
//! Only failing to open the directory itself is an error, and cancellation
//! stops the loop before the next entry.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::contract::ObjectStorage;

/// Result of attempting one directory entry.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub file_name: String,
    pub key: String,
    pub path: PathBuf,
    /// `Err` carries the rendered upload error.
    pub result: Result<(), String>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-entry outcomes, in upload order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadReport {
    pub bucket: String,
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn uploaded(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(UploadOutcome::is_success)
    }
}

/// Errors that stop the upload loop.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read data directory {path:?}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `partial` holds the outcomes of the entries attempted before the cancel.
    #[error("upload cancelled with {remaining} entries not attempted")]
    Cancelled {
        partial: UploadReport,
        remaining: usize,
    },
}

/// Upload every entry of `data_dir` to `bucket`, keyed by file name.
///
/// Entries are visited in file-name order. An in-flight upload is abandoned
/// when `cancel` fires.
pub async fn upload_directory<S>(
    storage: &S,
    bucket: &str,
    data_dir: &Path,
    cancel: &CancellationToken,
) -> Result<UploadReport, UploadError>
where
    S: ObjectStorage + ?Sized,
{
    info!(bucket, data_dir = %data_dir.display(), "Uploading data directory");

    let read_dir = std::fs::read_dir(data_dir).map_err(|source| {
        error!(error = ?source, data_dir = %data_dir.display(), "Failed to read data directory");
        UploadError::ReadDir {
            path: data_dir.to_path_buf(),
            source,
        }
    })?;

    let mut outcomes = Vec::new();
    let mut entries = Vec::new();
    for entry in read_dir {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                error!(error = ?e, data_dir = %data_dir.display(), "Failed to read directory entry");
                outcomes.push(UploadOutcome {
                    file_name: String::new(),
                    key: String::new(),
                    path: data_dir.to_path_buf(),
                    result: Err(format!("failed to read directory entry: {e}")),
                });
            }
        }
    }
    entries.sort_by_key(|entry| entry.file_name());

    let total = entries.len();
    for (index, entry) in entries.into_iter().enumerate() {
        let path = entry.path();
        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                let lossy = raw.to_string_lossy().into_owned();
                warn!(file = %lossy, path = %path.display(), "Skipping file whose name is not valid UTF-8");
                // No key: a lossy name would not match the file on disk.
                outcomes.push(UploadOutcome {
                    file_name: lossy,
                    key: String::new(),
                    path,
                    result: Err("file name is not valid UTF-8".to_string()),
                });
                continue;
            }
        };
        let key = file_name.clone();

        let uploaded = if cancel.is_cancelled() {
            None
        } else {
            tokio::select! {
                biased;
                result = storage.upload_file(bucket, &key, &path) => Some(result),
                _ = cancel.cancelled() => None,
            }
        };
        let result = match uploaded {
            None => {
                warn!(bucket, remaining = total - index, "Upload cancelled");
                return Err(UploadError::Cancelled {
                    partial: UploadReport {
                        bucket: bucket.to_string(),
                        outcomes,
                    },
                    remaining: total - index,
                });
            }
            Some(Ok(())) => {
                info!(file = %file_name, bucket, key = %key, "Successfully uploaded {file_name} to {bucket}/{key}");
                Ok(())
            }
            Some(Err(e)) => {
                error!(file = %file_name, bucket, key = %key, error = %e, "Error uploading {file_name} to {bucket}/{key}");
                Err(e.to_string())
            }
        };

        outcomes.push(UploadOutcome {
            file_name,
            key,
            path,
            result,
        });
    }

    let report = UploadReport {
        bucket: bucket.to_string(),
        outcomes,
    };
    info!(
        bucket,
        uploaded = report.uploaded().count(),
        failed = report.failed().count(),
        "Finished uploading data directory"
    );
    Ok(report)
}
