//! Invocation identity: infrastructure type, prefix, project and stage.
//!
//! [`ValidationContext`] is immutable. Accepting an identity parameter
//! (`Prefix`, `ProjectId`, `StageId`) yields a new context instead of
//! updating shared state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Stage identifier for the stage-agnostic configuration.
pub const DEFAULT_STAGE: &str = "default";

/// Supported infrastructure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfraType {
    ServiceRole,
    Pipeline,
    Storage,
    Network,
}

impl InfraType {
    pub const ALL: [InfraType; 4] = [
        InfraType::ServiceRole,
        InfraType::Pipeline,
        InfraType::Storage,
        InfraType::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfraType::ServiceRole => "service-role",
            InfraType::Pipeline => "pipeline",
            InfraType::Storage => "storage",
            InfraType::Network => "network",
        }
    }

    /// Whether a deployment of this type must name a stage.
    pub fn requires_stage(&self) -> bool {
        !matches!(self, InfraType::ServiceRole | InfraType::Storage)
    }
}

impl fmt::Display for InfraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfraType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        InfraType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = InfraType::ALL.iter().map(|t| t.as_str()).collect();
                ConfigError::fatal(format!(
                    "Invalid infra_type '{}'. Must be one of {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Top-level samconfig keys a stage may not take.
const RESERVED_STAGE_IDS: &[&str] = &["atlantis", "version"];

/// Check that a stage identifier can key a deployment section.
pub fn check_stage_id(stage_id: &str) -> Result<()> {
    if stage_id.is_empty() {
        return Err(ConfigError::fatal("stage_id cannot be empty"));
    }
    if RESERVED_STAGE_IDS.contains(&stage_id) {
        return Err(ConfigError::fatal(format!("stage_id '{}' is reserved", stage_id)));
    }
    if stage_id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '.' | '[' | ']' | '"' | '\''))
    {
        return Err(ConfigError::fatal(format!(
            "stage_id '{}' contains characters not allowed in a section name",
            stage_id
        )));
    }
    Ok(())
}

/// Immutable identity threaded through validation and assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationContext {
    pub infra_type: InfraType,
    pub prefix: String,
    pub project_id: Option<String>,
    pub stage_id: String,
}

impl ValidationContext {
    pub fn new(infra_type: InfraType, prefix: impl Into<String>) -> Self {
        Self {
            infra_type,
            prefix: prefix.into(),
            project_id: None,
            stage_id: DEFAULT_STAGE.to_string(),
        }
    }

    /// Build a context from command-line identifiers, enforcing the
    /// per-infra-type requirements.
    pub fn from_invocation(
        infra_type: InfraType,
        prefix: &str,
        project_id: Option<&str>,
        stage_id: Option<&str>,
    ) -> Result<Self> {
        if prefix.is_empty() {
            return Err(ConfigError::fatal("prefix is required"));
        }

        let project_id = match project_id {
            Some(p) if !p.is_empty() => p,
            _ => return Err(ConfigError::fatal("project_id is required")),
        };

        if infra_type == InfraType::ServiceRole {
            let targets: Vec<&str> = InfraType::ALL
                .iter()
                .filter(|t| **t != InfraType::ServiceRole)
                .map(|t| t.as_str())
                .collect();
            if !targets.contains(&project_id) {
                return Err(ConfigError::fatal(format!(
                    "project_id must be one of {}",
                    targets.join(", ")
                )));
            }
        }

        let stage_id = match stage_id {
            Some(s) if !s.is_empty() => s,
            _ if infra_type.requires_stage() => {
                return Err(ConfigError::fatal(format!(
                    "stage_id is required for infrastructure type: {}",
                    infra_type
                )))
            }
            _ => DEFAULT_STAGE,
        };
        check_stage_id(stage_id)?;

        Ok(Self::new(infra_type, prefix)
            .with_project_id(Some(project_id.to_string()))
            .with_stage_id(stage_id))
    }

    pub fn with_prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    pub fn with_project_id(self, project_id: Option<String>) -> Self {
        Self {
            project_id: project_id.filter(|p| !p.is_empty()),
            ..self
        }
    }

    pub fn with_stage_id(self, stage_id: impl Into<String>) -> Self {
        let stage_id = stage_id.into();
        Self {
            stage_id: if stage_id.is_empty() {
                DEFAULT_STAGE.to_string()
            } else {
                stage_id
            },
            ..self
        }
    }

    /// Produce the context that results from accepting `value` for `name`.
    pub fn accept(&self, name: &str, value: &str) -> Self {
        let next = self.clone();
        match name {
            "Prefix" => next.with_prefix(value),
            "ProjectId" => next.with_project_id(Some(value.to_string())),
            "StageId" => next.with_stage_id(value),
            _ => next,
        }
    }

    pub fn is_default_stage(&self) -> bool {
        self.stage_id == DEFAULT_STAGE
    }

    /// `<prefix>-[<project>-][<stage>-]<infra_type>`
    pub fn stack_name(&self) -> String {
        let mut name = format!("{}-", self.prefix);
        if let Some(ref project) = self.project_id {
            name.push_str(project);
            name.push('-');
        }
        if !self.is_default_stage() {
            name.push_str(&self.stage_id);
            name.push('-');
        }
        name.push_str(self.infra_type.as_str());
        name
    }

    /// `<prefix>[-<project>]`, used in file names and application tags.
    pub fn application_id(&self) -> String {
        match self.project_id {
            Some(ref project) => format!("{}-{}", self.prefix, project),
            None => self.prefix.clone(),
        }
    }
}

/// Defaults derived from the stage identifier alone.
pub fn stage_defaults(stage_id: &str) -> BTreeMap<String, String> {
    let environment = if stage_id.starts_with('t') {
        "TEST"
    } else if stage_id.starts_with('d') {
        "DEV"
    } else {
        "PROD"
    };

    let branch = if stage_id == "prod" { "main" } else { stage_id };

    BTreeMap::from([
        ("DeployEnvironment".to_string(), environment.to_string()),
        ("RepositoryBranch".to_string(), branch.to_string()),
        ("CodeCommitBranch".to_string(), branch.to_string()),
    ])
}
