//! Deployment snapshots and their assembly from validated values.
//!
//! A snapshot is a value object: comparison is structural.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::{check_stage_id, InfraType, ValidationContext};
use crate::error::{ConfigError, Result};
use crate::schema::deploy::{check_deploy_parameter, required_deploy_parameters, CONFIRM_CHANGESET};
use crate::schema::{validate_all, ParameterSchema, TemplateInfo};
use crate::tags::{generate_tags, TagSet};

/// Capabilities every generated stack is deployed with.
pub const DEFAULT_CAPABILITIES: &str = "CAPABILITY_NAMED_IAM";

pub const TEMPLATE_FILE: &str = "template_file";
pub const CAPABILITIES: &str = "capabilities";
pub const STACK_NAME: &str = "stack_name";
pub const S3_PREFIX: &str = "s3_prefix";

/// Configuration of a single stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Per-stage deploy parameters (stack_name, s3_prefix, region, ...)
    #[serde(default)]
    pub deploy: BTreeMap<String, String>,

    #[serde(default)]
    pub parameter_overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub tags: TagSet,
}

/// Stage-partitioned configuration state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSnapshot {
    /// System-level deploy parameters shared by every stage
    #[serde(default)]
    pub atlantis: BTreeMap<String, String>,

    /// Keyed by stage id; `default` is the stage-agnostic configuration
    #[serde(default)]
    pub deployments: BTreeMap<String, Deployment>,
}

impl DeploymentSnapshot {
    pub fn is_empty(&self) -> bool {
        self.atlantis.is_empty() && self.deployments.is_empty()
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Deployment> {
        self.deployments.get(stage_id)
    }

    /// Template file recorded in the system parameters, reduced to a bare
    /// file name unless it is an `s3://` location.
    pub fn template_name(&self) -> Option<String> {
        let path = self.atlantis.get(TEMPLATE_FILE).filter(|p| !p.is_empty())?;
        if path.starts_with("s3://") {
            Some(path.clone())
        } else {
            path.rsplit('/').next().map(str::to_string)
        }
    }
}

/// Location of a template as recorded in samconfig.
pub fn template_location(infra_type: InfraType, template_file: &str) -> String {
    if template_file.starts_with("s3://") {
        template_file.to_string()
    } else {
        format!("../../local-templates/{}/{}", infra_type, template_file)
    }
}

/// Everything needed to assemble a snapshot for one stage.
#[derive(Debug, Clone)]
pub struct AssemblyInput<'a> {
    /// Identity from the command line
    pub invocation: &'a ValidationContext,
    pub schema: &'a ParameterSchema,
    pub template: &'a TemplateInfo,
    /// Accepted template parameter values
    pub parameters: &'a BTreeMap<String, String>,
    /// Accepted system deploy parameters (s3_bucket, region, ...)
    pub deploy_parameters: &'a BTreeMap<String, String>,
    /// User tags merged beneath the automated tags
    pub custom_tags: &'a TagSet,
    /// Existing local snapshot, if any
    pub local: Option<&'a DeploymentSnapshot>,
    /// Copy system deploy parameters into every existing stage
    pub apply_to_all: bool,
}

/// Build the snapshot for the stage named by the accepted parameters.
///
/// Every parameter value must validate against the schema; any violation
/// is fatal because the snapshot would be persisted.
pub fn assemble(input: &AssemblyInput<'_>) -> Result<DeploymentSnapshot> {
    if let Some(violation) = validate_all(input.schema, input.parameters).into_iter().next() {
        return Err(ConfigError::fatal(violation.to_string()));
    }

    let invocation = input.invocation;
    let ctx = ["Prefix", "ProjectId", "StageId"]
        .iter()
        .fold(invocation.clone(), |ctx, name| {
            match input.parameters.get(*name).filter(|v| !v.is_empty()) {
                Some(value) => ctx.accept(name, value),
                None => ctx,
            }
        });
    check_stage_id(&ctx.stage_id)?;

    let atlantis = system_parameters(ctx.infra_type, input)?;

    // A changed prefix or project means this is a copy: start from scratch.
    let same_owner = ctx.prefix == invocation.prefix && ctx.project_id == invocation.project_id;
    let mut deployments = match input.local {
        Some(local) if same_owner => local.deployments.clone(),
        _ => BTreeMap::new(),
    };

    if input.apply_to_all && deployments.len() > 1 {
        info!(
            "Applying deploy parameters to all {} deployments of {}",
            deployments.len(),
            ctx.application_id()
        );
        for deployment in deployments.values_mut() {
            deployment.deploy.extend(atlantis.clone());
        }
    }

    let stack_name = ctx.stack_name();
    let mut deploy = atlantis.clone();
    deploy.insert(STACK_NAME.to_string(), stack_name.clone());
    deploy.insert(S3_PREFIX.to_string(), stack_name);

    let tags = generate_tags(&ctx, input.parameters, input.template, input.custom_tags);

    deployments.insert(
        ctx.stage_id.clone(),
        Deployment {
            deploy,
            parameter_overrides: input.parameters.clone(),
            tags,
        },
    );

    Ok(DeploymentSnapshot {
        atlantis,
        deployments,
    })
}

fn system_parameters(
    infra_type: InfraType,
    input: &AssemblyInput<'_>,
) -> Result<BTreeMap<String, String>> {
    let mut atlantis = BTreeMap::new();
    atlantis.insert(
        TEMPLATE_FILE.to_string(),
        template_location(infra_type, &input.template.file),
    );
    atlantis.insert(CAPABILITIES.to_string(), DEFAULT_CAPABILITIES.to_string());

    for name in required_deploy_parameters(infra_type) {
        let value = input
            .deploy_parameters
            .get(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::fatal(format!("{} is required", name)))?;
        check_deploy_parameter(name, value).map_err(|v| ConfigError::fatal(v.to_string()))?;
        let value = if name == CONFIRM_CHANGESET {
            value.to_lowercase()
        } else {
            value.clone()
        };
        atlantis.insert(name.to_string(), value);
    }

    Ok(atlantis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::deploy::{REGION, ROLE_ARN};
    use crate::schema::{ParameterDefinition, ParameterKind};

    struct Fixture {
        ctx: ValidationContext,
        schema: ParameterSchema,
        template: TemplateInfo,
        parameters: BTreeMap<String, String>,
        deploy: BTreeMap<String, String>,
        custom: TagSet,
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fixture() -> Fixture {
        let mut schema = ParameterSchema::new();
        schema.insert("Prefix", ParameterDefinition::new(ParameterKind::string()));
        schema.insert("ProjectId", ParameterDefinition::new(ParameterKind::string()));
        schema.insert("StageId", ParameterDefinition::new(ParameterKind::string()));
        schema.insert(
            "Memory",
            ParameterDefinition::new(ParameterKind::Number {
                min_value: Some(128.0),
                max_value: Some(1024.0),
                ssm: false,
            }),
        );

        Fixture {
            ctx: ValidationContext::from_invocation(
                InfraType::Network,
                "acme",
                Some("widget"),
                Some("test"),
            )
            .unwrap(),
            schema,
            template: TemplateInfo::from_bytes("template-network.yml", b"# Version: v1\n"),
            parameters: map(&[
                ("Prefix", "acme"),
                ("ProjectId", "widget"),
                ("StageId", "test"),
                ("Memory", "256"),
            ]),
            deploy: map(&[
                ("s3_bucket", "acme-artifacts"),
                ("region", "us-east-1"),
                ("confirm_changeset", "True"),
            ]),
            custom: [("Team", "web")].into_iter().collect(),
        }
    }

    fn input<'a>(f: &'a Fixture, local: Option<&'a DeploymentSnapshot>) -> AssemblyInput<'a> {
        AssemblyInput {
            invocation: &f.ctx,
            schema: &f.schema,
            template: &f.template,
            parameters: &f.parameters,
            deploy_parameters: &f.deploy,
            custom_tags: &f.custom,
            local,
            apply_to_all: false,
        }
    }

    #[test]
    fn test_assemble_new_stage() {
        let f = fixture();
        let snapshot = assemble(&input(&f, None)).unwrap();

        assert_eq!(
            snapshot.atlantis[TEMPLATE_FILE],
            "../../local-templates/network/template-network.yml"
        );
        assert_eq!(snapshot.atlantis[CONFIRM_CHANGESET], "true");
        assert_eq!(snapshot.atlantis[CAPABILITIES], DEFAULT_CAPABILITIES);
        assert!(!snapshot.atlantis.contains_key(ROLE_ARN));

        let test = snapshot.stage("test").unwrap();
        assert_eq!(test.deploy[STACK_NAME], "acme-widget-test-network");
        assert_eq!(test.deploy[S3_PREFIX], "acme-widget-test-network");
        assert_eq!(test.parameter_overrides["Memory"], "256");
        assert_eq!(test.tags.get("Team"), Some("web"));
        assert_eq!(test.tags.get("Stage"), Some("test"));
    }

    #[test]
    fn test_assemble_rejects_invalid_values() {
        let mut f = fixture();
        f.parameters.insert("Memory".to_string(), "4096".to_string());
        let err = assemble(&input(&f, None)).unwrap_err();
        assert!(matches!(err, ConfigError::Fatal(_)));
        assert!(err.to_string().contains("Memory"));
    }

    #[test]
    fn test_assemble_requires_deploy_parameters() {
        let mut f = fixture();
        f.deploy.remove("region");
        let err = assemble(&input(&f, None)).unwrap_err();
        assert!(err.to_string().contains("region is required"));
    }

    #[test]
    fn test_assemble_keeps_other_stages() {
        let f = fixture();
        let mut local = DeploymentSnapshot::default();
        local.deployments.insert("prod".to_string(), Deployment::default());
        local.deployments.insert("dev".to_string(), Deployment::default());

        let mut with_all = input(&f, Some(&local));
        let snapshot = assemble(&with_all).unwrap();
        assert_eq!(snapshot.deployments.len(), 3);
        assert!(snapshot.stage("prod").unwrap().deploy.is_empty());

        with_all.apply_to_all = true;
        let snapshot = assemble(&with_all).unwrap();
        assert_eq!(snapshot.stage("prod").unwrap().deploy[REGION], "us-east-1");
        assert!(!snapshot.stage("prod").unwrap().deploy.contains_key(STACK_NAME));
    }

    #[test]
    fn test_assemble_copy_drops_existing_stages() {
        let mut f = fixture();
        f.parameters.insert("Prefix".to_string(), "beta".to_string());
        let mut local = DeploymentSnapshot::default();
        local.deployments.insert("prod".to_string(), Deployment::default());

        let snapshot = assemble(&input(&f, Some(&local))).unwrap();
        assert_eq!(snapshot.deployments.len(), 1);
        assert_eq!(
            snapshot.stage("test").unwrap().deploy[STACK_NAME],
            "beta-widget-test-network"
        );
    }

    #[test]
    fn test_template_name() {
        let mut snapshot = DeploymentSnapshot::default();
        assert_eq!(snapshot.template_name(), None);
        snapshot.atlantis.insert(
            TEMPLATE_FILE.to_string(),
            "../../local-templates/network/template-network.yml".to_string(),
        );
        assert_eq!(snapshot.template_name().as_deref(), Some("template-network.yml"));
        snapshot.atlantis.insert(
            TEMPLATE_FILE.to_string(),
            "s3://bucket/templates/t.yml".to_string(),
        );
        assert_eq!(
            snapshot.template_name().as_deref(),
            Some("s3://bucket/templates/t.yml")
        );
    }
}
