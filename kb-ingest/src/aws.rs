#![doc = "AWS integration for the CLI: implements the core capability traits with the S3 and Bedrock Agent SDK clients."]
//
//! # AWS clients (CLI <-> Core)
//!
//! - [`S3Storage`] implements [`ObjectStorage`] with `PutObject`.
//! - [`BedrockIngestion`] implements [`IngestionService`] with
//!   `StartIngestionJob` / `GetIngestionJob`, pinned to one region.
//!
//! Credentials and the default region come from the ambient AWS configuration
//! chain (environment, profile, instance metadata). Only the ingestion
//! client's region is overridden.
//!
//! Each file goes up in a single `PutObject`, which S3 caps at 5 GiB. Larger
//! files are refused before any bytes are sent and show up as a failed
//! upload; multipart upload is not implemented.

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_bedrockagent::config::Region;
use aws_sdk_s3::primitives::ByteStream;

use kb_ingest_core::contract::{
    ClientError, IngestionJob, IngestionJobStatus, IngestionService, IngestionStatistics,
    ObjectStorage,
};

/// Largest object S3 accepts in one `PutObject` request.
pub const MAX_SINGLE_PUT_BYTES: u64 = 5 * 1024 * 1024 * 1024;

fn check_single_put_size(len: u64) -> Result<(), ClientError> {
    if len > MAX_SINGLE_PUT_BYTES {
        return Err(format!(
            "file is {len} bytes, over the {MAX_SINGLE_PUT_BYTES} byte single PutObject limit"
        )
        .into());
    }
    Ok(())
}

/// Load the shared SDK configuration from the environment.
pub async fn load_sdk_config() -> SdkConfig {
    let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    tracing::info!(
        region = %config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "<unset>".to_string()),
        "Loaded AWS SDK configuration"
    );
    config
}

pub struct S3Storage {
    client: aws_sdk_s3::Client,
}

impl S3Storage {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), ClientError> {
        tracing::debug!(bucket, key, path = %path.display(), "Uploading file to S3");

        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, path = %path.display(), "Failed to stat file for upload");
                Box::new(e) as ClientError
            })?
            .len();
        if let Err(e) = check_single_put_size(len) {
            tracing::error!(error = %e, bucket, key, "File too large for a single PutObject");
            return Err(e);
        }

        let body = ByteStream::from_path(path).await.map_err(|e| {
            tracing::error!(error = ?e, path = %path.display(), "Failed to open file for upload");
            Box::new(e) as ClientError
        })?;

        match self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let detail = aws_sdk_s3::error::DisplayErrorContext(&e).to_string();
                tracing::error!(error = %detail, bucket, key, "S3 PutObject failed");
                Err(detail.into())
            }
        }
    }
}

pub struct BedrockIngestion {
    client: aws_sdk_bedrockagent::Client,
}

impl BedrockIngestion {
    pub fn new(sdk_config: &SdkConfig, region: &str) -> Self {
        let conf = aws_sdk_bedrockagent::config::Builder::from(sdk_config)
            .region(Region::new(region.to_string()))
            .build();
        tracing::info!(region, "Initialised Bedrock Agent client");
        Self {
            client: aws_sdk_bedrockagent::Client::from_conf(conf),
        }
    }
}

fn to_ingestion_job(job: &aws_sdk_bedrockagent::types::IngestionJob) -> IngestionJob {
    IngestionJob {
        ingestion_job_id: job.ingestion_job_id().to_string(),
        knowledge_base_id: job.knowledge_base_id().to_string(),
        data_source_id: job.data_source_id().to_string(),
        status: IngestionJobStatus::from(job.status().as_str()),
        failure_reasons: job.failure_reasons().to_vec(),
        statistics: job.statistics().map(|s| IngestionStatistics {
            documents_scanned: s.number_of_documents_scanned(),
            new_documents_indexed: s.number_of_new_documents_indexed(),
            modified_documents_indexed: s.number_of_modified_documents_indexed(),
            documents_deleted: s.number_of_documents_deleted(),
            documents_failed: s.number_of_documents_failed(),
        }),
    }
}

#[async_trait]
impl IngestionService for BedrockIngestion {
    async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        description: &str,
    ) -> Result<IngestionJob, ClientError> {
        let result = self
            .client
            .start_ingestion_job()
            .knowledge_base_id(knowledge_base_id)
            .data_source_id(data_source_id)
            .description(description)
            .send()
            .await;

        match result {
            Ok(output) => {
                let job = output
                    .ingestion_job()
                    .ok_or("StartIngestionJob response contained no ingestion job")?;
                Ok(to_ingestion_job(job))
            }
            Err(e) => {
                let detail = aws_sdk_bedrockagent::error::DisplayErrorContext(&e).to_string();
                tracing::error!(error = %detail, knowledge_base_id, data_source_id, "StartIngestionJob failed");
                Err(detail.into())
            }
        }
    }

    async fn get_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
        ingestion_job_id: &str,
    ) -> Result<IngestionJob, ClientError> {
        let result = self
            .client
            .get_ingestion_job()
            .knowledge_base_id(knowledge_base_id)
            .data_source_id(data_source_id)
            .ingestion_job_id(ingestion_job_id)
            .send()
            .await;

        match result {
            Ok(output) => {
                let job = output
                    .ingestion_job()
                    .ok_or("GetIngestionJob response contained no ingestion job")?;
                Ok(to_ingestion_job(job))
            }
            Err(e) => {
                let detail = aws_sdk_bedrockagent::error::DisplayErrorContext(&e).to_string();
                tracing::error!(error = %detail, ingestion_job_id, "GetIngestionJob failed");
                Err(detail.into())
            }
        }
    }
}
