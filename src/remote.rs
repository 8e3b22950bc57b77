//! Observations of deployed stacks.
//!
//! The file-backed source reads `<stacks>/<stack_name>.json`, shaped like a
//! single entry of a CloudFormation `DescribeStacks` response.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use atlantis_core::snapshot::{CAPABILITIES, TEMPLATE_FILE};
use atlantis_core::{ConfigError, Deployment, DeploymentSnapshot, Tag, TagSet};

use crate::error::{Result, ShellError};

const TEMPLATE_FILE_TAG: &str = "atlantis:TemplateFile";

/// Anything that can report the deployed configuration of a stack.
pub trait RemoteSnapshotSource {
    /// The deployed configuration of `stack_name`, placed under `stage`,
    /// or `None` when the stack does not exist.
    fn fetch(&self, stack_name: &str, stage: &str) -> Result<Option<DeploymentSnapshot>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackParameter {
    pub parameter_key: String,
    pub parameter_value: String,
}

/// Deployed state of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StackObservation {
    pub stack_id: String,
    #[serde(default)]
    pub parameters: Vec<StackParameter>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl StackObservation {
    /// Region is the fourth `:` field of the stack ARN.
    pub fn region(&self) -> Option<&str> {
        self.stack_id.split(':').nth(3).filter(|r| !r.is_empty())
    }

    pub fn to_snapshot(&self, stage: &str) -> Result<DeploymentSnapshot> {
        let region = self.region().ok_or_else(|| {
            ConfigError::malformed("StackId", format!("no region in '{}'", self.stack_id))
        })?;

        let mut atlantis = BTreeMap::new();
        atlantis.insert(CAPABILITIES.to_string(), self.capabilities.join(" "));
        atlantis.insert("region".to_string(), region.to_string());

        let tags: TagSet = self.tags.iter().cloned().collect();
        if let Some(file) = tags.get(TEMPLATE_FILE_TAG) {
            let location = if file.starts_with("s3://") {
                file.to_string()
            } else {
                format!("./templates/{}", file)
            };
            atlantis.insert(TEMPLATE_FILE.to_string(), location);
        }

        let parameter_overrides = self
            .parameters
            .iter()
            .map(|p| (p.parameter_key.clone(), p.parameter_value.clone()))
            .collect();

        let mut deployments = BTreeMap::new();
        deployments.insert(
            stage.to_string(),
            Deployment {
                deploy: BTreeMap::new(),
                parameter_overrides,
                tags,
            },
        );

        Ok(DeploymentSnapshot {
            atlantis,
            deployments,
        })
    }
}

/// Reads stack observations from a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileStackSource {
    dir: PathBuf,
}

impl FileStackSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn observe(&self, stack_name: &str) -> Result<Option<StackObservation>> {
        let path = self.dir.join(format!("{}.json", stack_name));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Stack '{}' does not exist", stack_name);
                return Ok(None);
            }
            Err(e) => return Err(ShellError::io(&path, e)),
        };
        let observation =
            serde_json::from_slice(&bytes).map_err(|e| ShellError::parse(&path, e.to_string()))?;
        info!("Found deployed stack {}", stack_name);
        Ok(Some(observation))
    }
}

impl RemoteSnapshotSource for FileStackSource {
    fn fetch(&self, stack_name: &str, stage: &str) -> Result<Option<DeploymentSnapshot>> {
        match self.observe(stack_name)? {
            Some(observation) => observation.to_snapshot(stage).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STACK: &str = r#"{
        "StackId": "arn:aws:cloudformation:us-west-2:123456789012:stack/acme-widget-test-network/abc",
        "Parameters": [
            {"ParameterKey": "Prefix", "ParameterValue": "acme"},
            {"ParameterKey": "Memory", "ParameterValue": "512"}
        ],
        "Tags": [
            {"Key": "atlantis:TemplateFile", "Value": "template-network.yml"},
            {"Key": "Team", "Value": "web"}
        ],
        "Capabilities": ["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"]
    }"#;

    #[test]
    fn test_observation_to_snapshot() {
        let observation: StackObservation = serde_json::from_str(STACK).unwrap();
        let snapshot = observation.to_snapshot("test").unwrap();

        assert_eq!(snapshot.atlantis["region"], "us-west-2");
        assert_eq!(snapshot.atlantis["capabilities"], "CAPABILITY_IAM CAPABILITY_NAMED_IAM");
        assert_eq!(snapshot.atlantis["template_file"], "./templates/template-network.yml");

        let test = &snapshot.deployments["test"];
        assert_eq!(test.parameter_overrides["Memory"], "512");
        assert_eq!(test.tags.get("Team"), Some("web"));
    }

    #[test]
    fn test_s3_template_kept() {
        let mut observation: StackObservation = serde_json::from_str(STACK).unwrap();
        observation.tags[0].value = "s3://bucket/t.yml".to_string();
        let snapshot = observation.to_snapshot("test").unwrap();
        assert_eq!(snapshot.atlantis["template_file"], "s3://bucket/t.yml");
    }

    #[test]
    fn test_bad_stack_id() {
        let observation = StackObservation {
            stack_id: "not-an-arn".to_string(),
            parameters: Vec::new(),
            tags: Vec::new(),
            capabilities: Vec::new(),
        };
        assert!(observation.to_snapshot("test").is_err());
    }

    #[test]
    fn test_file_source() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("acme-widget-test-network.json"), STACK).unwrap();
        let source = FileStackSource::new(temp.path());

        let snapshot = source.fetch("acme-widget-test-network", "test").unwrap().unwrap();
        assert_eq!(snapshot.deployments["test"].parameter_overrides["Prefix"], "acme");
        assert!(source.fetch("acme-widget-prod-network", "prod").unwrap().is_none());
    }

    #[test]
    fn test_file_source_unparseable() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.json"), "{").unwrap();
        let source = FileStackSource::new(temp.path());
        assert!(matches!(
            source.fetch("broken", "test"),
            Err(ShellError::Parse { .. })
        ));
    }
}
