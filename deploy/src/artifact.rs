//! Hardhat build artifacts (`artifacts/contracts/<Name>.sol/<Name>.json`).

use std::fs;
use std::path::{Path, PathBuf};

use alloy::primitives::{Bytes, hex};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

const ARTIFACTS_DIR: &str = "artifacts/contracts";

/// The fields of a compiled contract that deployment needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: String,
    #[serde(default)]
    abi: Vec<serde_json::Value>,
    bytecode: String,
    #[serde(default)]
    link_references: serde_json::Map<String, serde_json::Value>,
}

/// Creation bytecode of one contract, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub name: String,
    pub bytecode: Bytes,
}

/// Default artifact location for `contract` relative to `root`.
pub fn default_artifact_path(root: &Path, contract: &str) -> PathBuf {
    root.join(ARTIFACTS_DIR)
        .join(format!("{contract}.sol"))
        .join(format!("{contract}.json"))
}

/// Loads the artifact at `path` and checks it is deployable as `contract`
/// with no constructor arguments.
pub fn load_artifact(path: &Path, contract: &str) -> Result<ContractArtifact> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    parse_artifact(&contents, contract)
        .with_context(|| format!("Invalid artifact {}", path.display()))
}

fn parse_artifact(contents: &str, contract: &str) -> Result<ContractArtifact> {
    let raw: RawArtifact = serde_json::from_str(contents)?;

    if raw.contract_name != contract {
        bail!(
            "artifact is for contract `{}`, expected `{contract}`",
            raw.contract_name
        );
    }

    if !raw.link_references.is_empty() {
        let libraries: Vec<_> = raw.link_references.keys().cloned().collect();
        bail!("bytecode needs unlinked libraries: {}", libraries.join(", "));
    }

    if let Some(inputs) = constructor_inputs(&raw.abi) {
        if inputs > 0 {
            bail!("constructor takes {inputs} argument(s); none can be supplied");
        }
    }

    let bytecode = hex::decode(raw.bytecode.trim())
        .map_err(|e| anyhow!("bytecode is not valid hex: {e}"))?;
    if bytecode.is_empty() {
        bail!("contract `{contract}` has no creation bytecode (abstract or interface?)");
    }

    Ok(ContractArtifact {
        name: raw.contract_name,
        bytecode: Bytes::from(bytecode),
    })
}

fn constructor_inputs(abi: &[serde_json::Value]) -> Option<usize> {
    abi.iter()
        .find(|item| item.get("type").and_then(|t| t.as_str()) == Some("constructor"))
        .map(|ctor| {
            ctor.get("inputs")
                .and_then(|i| i.as_array())
                .map_or(0, Vec::len)
        })
}
