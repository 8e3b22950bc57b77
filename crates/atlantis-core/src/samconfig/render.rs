use std::fmt::Write as _;

use serde::Serialize;
use tracing::warn;

use crate::codec::{stringify_overrides, stringify_tags};
use crate::context::{check_stage_id, InfraType, ValidationContext, DEFAULT_STAGE};
use crate::snapshot::{Deployment, DeploymentSnapshot};

use super::{stage_order, ATLANTIS_SECTION, FORMAT_VERSION, PARAMETER_OVERRIDES, TAGS};

const DEFAULT_PROFILE: &str = "default";
const DEFAULT_PROGRAM: &str = "atlantis-config";
const RULE: &str = "# =====================================================";

/// Identity and invocation details written into section comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderContext {
    pub infra_type: InfraType,
    pub prefix: String,
    pub project_id: Option<String>,
    pub profile: String,
    /// Command that regenerates the document
    pub program: String,
}

impl RenderContext {
    pub fn new(ctx: &ValidationContext) -> Self {
        Self {
            infra_type: ctx.infra_type,
            prefix: ctx.prefix.clone(),
            project_id: ctx.project_id.clone(),
            profile: DEFAULT_PROFILE.to_string(),
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn application_id(&self) -> String {
        match self.project_id {
            Some(ref project) => format!("{}-{}", self.prefix, project),
            None => self.prefix.clone(),
        }
    }

    fn generate_command(&self, stage: Option<&str>) -> String {
        let mut command = format!("{} generate {} {}", self.program, self.infra_type, self.prefix);
        if let Some(ref project) = self.project_id {
            command.push(' ');
            command.push_str(project);
        }
        if let Some(stage) = stage {
            command.push(' ');
            command.push_str(stage);
        }
        if self.profile != DEFAULT_PROFILE {
            command.push_str(" --profile ");
            command.push_str(&self.profile);
        }
        command
    }
}

/// One table of the document with the comment block written above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub comment: String,
    pub body: String,
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn key_repr(key: &str) -> String {
    if is_bare_key(key) {
        key.to_string()
    } else {
        toml::Value::String(key.to_string()).to_string()
    }
}

/// `true`/`false` are written as TOML booleans, everything else as strings.
fn value_repr(value: &str) -> String {
    let value = match value {
        "true" => toml::Value::Boolean(true),
        "false" => toml::Value::Boolean(false),
        other => toml::Value::String(other.to_string()),
    };
    value.to_string()
}

fn table<'a>(name: &str, entries: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let mut body = format!("[{}.deploy.parameters]\n", key_repr(name));
    for (key, value) in entries {
        let _ = writeln!(body, "{} = {}", key_repr(key), value);
    }
    body
}

fn header(ctx: &RenderContext, snapshot: &DeploymentSnapshot) -> Section {
    let staged = snapshot.deployments.keys().any(|s| s != DEFAULT_STAGE);
    let mut command = ctx.generate_command(None);
    if staged {
        command.push_str(" <StageId>");
    }
    let comment = [
        "# !!! DO NOT EDIT THIS FILE !!!".to_string(),
        String::new(),
        "# Make changes and re-generate this file by running:".to_string(),
        String::new(),
        format!("# {}", command),
        String::new(),
        "# Using the generator provides consistent parameter overrides and tags and ensures your changes are not overwritten!".to_string(),
    ]
    .join("\n");

    Section {
        name: ATLANTIS_SECTION.to_string(),
        comment,
        body: table(
            ATLANTIS_SECTION,
            snapshot.atlantis.iter().map(|(k, v)| (k.as_str(), value_repr(v))),
        ),
    }
}

fn stage_section(ctx: &RenderContext, stage: &str, deployment: &Deployment) -> Section {
    let regenerate = if stage == DEFAULT_STAGE {
        ctx.generate_command(None)
    } else {
        ctx.generate_command(Some(stage))
    };
    let comment = [
        RULE.to_string(),
        format!("# {} Deployment Configuration", stage),
        String::new(),
        "# Deploy command:".to_string(),
        format!(
            "# sam deploy --config-env {} --config-file samconfig-{}-{}.toml --profile {}",
            stage,
            ctx.application_id(),
            ctx.infra_type,
            ctx.profile
        ),
        String::new(),
        "# Do not update this file!".to_string(),
        "# To update parameter_overrides or tags for this deployment, run:".to_string(),
        format!("# {}", regenerate),
    ]
    .join("\n");

    let deploy = deployment
        .deploy
        .iter()
        .filter(|(k, _)| k.as_str() != PARAMETER_OVERRIDES && k.as_str() != TAGS)
        .map(|(k, v)| (k.as_str(), value_repr(v)));
    let encoded = [
        (
            PARAMETER_OVERRIDES,
            toml::Value::String(stringify_overrides(&deployment.parameter_overrides)).to_string(),
        ),
        (
            TAGS,
            toml::Value::String(stringify_tags(&deployment.tags)).to_string(),
        ),
    ];

    Section {
        name: stage.to_string(),
        comment,
        body: table(stage, deploy.chain(encoded)),
    }
}

/// Render `snapshot` as ordered sections: the shared header first, then one
/// section per stage.
///
/// Stages whose id cannot key a section (`atlantis`, `version`, ids with
/// whitespace or TOML punctuation) are left out with a warning.
pub fn render(snapshot: &DeploymentSnapshot, ctx: &RenderContext) -> Vec<Section> {
    let mut sections = vec![header(ctx, snapshot)];
    for stage in stage_order(snapshot.deployments.keys().map(String::as_str)) {
        if let Err(e) = check_stage_id(stage) {
            warn!("Not writing stage section: {}", e);
            continue;
        }
        if let Some(deployment) = snapshot.deployments.get(stage) {
            sections.push(stage_section(ctx, stage, deployment));
        }
    }
    sections
}

/// Join sections into a complete document.
pub fn to_document(sections: &[Section]) -> String {
    let mut doc = format!("version = {}\n", FORMAT_VERSION);
    for section in sections {
        doc.push('\n');
        if !section.comment.is_empty() {
            doc.push_str(&section.comment);
            doc.push_str("\n\n");
        }
        doc.push_str(&section.body);
    }
    doc
}
