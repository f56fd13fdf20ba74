use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Outputs of the deployment stack that the ingestion run needs.
///
/// Deserialised from one stack entry of `outputs.json`; unrelated outputs of
/// the same stack are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentOutputs {
    pub knowledge_base_id: String,
    pub data_source_id: String,
    pub resume_bucket_name: String,
}

impl DeploymentOutputs {
    pub fn trace_loaded(&self, stack_name: &str) {
        info!(
            stack = stack_name,
            knowledge_base_id = %self.knowledge_base_id,
            data_source_id = %self.data_source_id,
            bucket = %self.resume_bucket_name,
            "Loaded deployment outputs"
        );
        debug!(?self, "Deployment outputs (full debug)");
    }
}
