/// `load_config` module: reads the deployment outputs document and selects the stack to ingest into.
///
/// The document is the JSON written by the deployment tool, one object per stack:
///
/// ```json
/// { "MyStack": { "KnowledgeBaseId": "...", "DataSourceId": "...", "ResumeBucketName": "..." } }
/// ```
///
/// Without an explicit stack name the first stack in document order is used.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary: unreadable
/// file, malformed JSON, an empty document, an unknown stack, or a stack missing
/// one of the three required outputs.
use anyhow::{Context, Result};
use kb_ingest_core::config::DeploymentOutputs;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// A stack's outputs together with the stack name they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedOutputs {
    pub stack_name: String,
    pub outputs: DeploymentOutputs,
}

pub fn load_config<P: AsRef<Path>>(path: P, stack: Option<&str>) -> Result<LoadedOutputs> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading deployment outputs from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Outputs file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read outputs file");
            return Err(anyhow::anyhow!(
                "Failed to read outputs file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let stacks: Map<String, Value> = match serde_json::from_str(&config_content) {
        Ok(stacks) => stacks,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse outputs JSON");
            return Err(anyhow::anyhow!("Failed to parse outputs JSON: {e}"));
        }
    };

    let (stack_name, stack_outputs) = match stack {
        Some(name) => {
            let outputs = stacks.get(name).with_context(|| {
                format!("Stack {name:?} not found in {path_ref:?}")
            })?;
            (name.to_string(), outputs.clone())
        }
        None => {
            let (name, outputs) = stacks
                .into_iter()
                .next()
                .with_context(|| format!("No stacks found in {path_ref:?}"))?;
            (name, outputs)
        }
    };

    let outputs: DeploymentOutputs = serde_json::from_value(stack_outputs)
        .with_context(|| format!("Invalid outputs for stack {stack_name:?}"))?;
    outputs.trace_loaded(&stack_name);

    Ok(LoadedOutputs {
        stack_name,
        outputs,
    })
}
