//! System tags derived from the accepted parameter values.

use std::collections::BTreeMap;

use crate::context::ValidationContext;
use crate::schema::TemplateInfo;

use super::{merge, Tag, TagSet};

fn non_empty<'a>(params: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

/// Derive the system tag set for a deployment.
///
/// Identity values come from `params` when present, otherwise from `ctx`.
/// Tags whose value would be empty are omitted.
pub fn automated_tags(
    ctx: &ValidationContext,
    params: &BTreeMap<String, String>,
    template: &TemplateInfo,
) -> TagSet {
    let prefix = non_empty(params, "Prefix").unwrap_or(&ctx.prefix);
    let project_id = non_empty(params, "ProjectId").or(ctx.project_id.as_deref());
    let stage_id = non_empty(params, "StageId");

    let mut tags = TagSet::new();
    let mut push = |key: &str, value: String| {
        if !value.is_empty() {
            tags.insert(Tag::new(key, value));
        }
    };

    push("Atlantis", format!("{}-infrastructure", ctx.infra_type));
    push("atlantis:Prefix", prefix.to_string());
    push("Provisioner", "CloudFormation".to_string());
    push("DeployedUsing", "AWS SAM CLI".to_string());
    push(
        "atlantis:TemplateVersion",
        format!("{} {}", template.version, template.hash_id),
    );
    push("atlantis:TemplateFile", template.file.clone());

    if let Some(project) = project_id {
        let application = format!("{}-{}", prefix, project);
        push("atlantis:Application", application.clone());
        push("Name", application);

        if let Some(stage) = stage_id {
            push(
                "atlantis:ApplicationDeploymentId",
                format!("{}-{}-{}", prefix, project, stage),
            );
        }
    }

    if let Some(stage) = stage_id {
        push("Stage", stage.to_string());
    }

    if let Some(env) = non_empty(params, "DeployEnvironment") {
        push("Environment", env.to_string());
    }

    if let Some(email) = non_empty(params, "AlarmNotificationEmail") {
        push("AlarmNotificationEmail", email.to_string());
    }

    if let Some(repo) =
        non_empty(params, "Repository").or_else(|| non_empty(params, "CodeCommitRepository"))
    {
        push("CodeCommitRepository", repo.to_string());
    }

    if let Some(branch) =
        non_empty(params, "RepositoryBranch").or_else(|| non_empty(params, "CodeCommitBranch"))
    {
        push("CodeCommitBranch", branch.to_string());
    }

    tags
}

/// System tags with user-defined tags merged on top.
pub fn generate_tags(
    ctx: &ValidationContext,
    params: &BTreeMap<String, String>,
    template: &TemplateInfo,
    custom: &TagSet,
) -> TagSet {
    merge(&automated_tags(ctx, params, template), custom)
}
