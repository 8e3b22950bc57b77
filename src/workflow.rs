//! End-to-end operations behind the CLI subcommands.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use atlantis_core::defaults::{atlantis_defaults, parameter_defaults, tag_defaults};
use atlantis_core::samconfig::RenderContext;
use atlantis_core::schema::validate;
use atlantis_core::{
    assemble, collect, diff_observed, reconcile, tags, AssemblyInput, ConflictResolver,
    DeploymentSnapshot, DiffReport, InfraType, MapSource, SchemaViolation, TagSet,
    ValidationContext,
};

use crate::config::{EffectiveDefaults, Layout};
use crate::error::{Result, ShellError};
use crate::remote::RemoteSnapshotSource;
use crate::store::SamconfigStore;
use crate::template;

/// Identity and non-interactive answers for one invocation.
#[derive(Debug, Clone)]
pub struct Request {
    pub infra_type: InfraType,
    pub prefix: String,
    pub project_id: Option<String>,
    pub stage_id: Option<String>,
    pub profile: String,
    /// Template file name; otherwise the recorded or only template is used
    pub template: Option<String>,
    /// Template parameter values
    pub values: BTreeMap<String, String>,
    /// System deploy parameters (s3_bucket, region, ...)
    pub deploy: BTreeMap<String, String>,
    pub tags: TagSet,
    /// Compare against the deployed stack before generating
    pub check_stack: bool,
    pub apply_to_all: bool,
}

impl Request {
    pub fn new(infra_type: InfraType, prefix: impl Into<String>) -> Self {
        Self {
            infra_type,
            prefix: prefix.into(),
            project_id: None,
            stage_id: None,
            profile: "default".to_string(),
            template: None,
            values: BTreeMap::new(),
            deploy: BTreeMap::new(),
            tags: TagSet::new(),
            check_stack: false,
            apply_to_all: false,
        }
    }

    pub fn context(&self) -> Result<ValidationContext> {
        Ok(ValidationContext::from_invocation(
            self.infra_type,
            &self.prefix,
            self.project_id.as_deref(),
            self.stage_id.as_deref(),
        )?)
    }
}

/// Result of a successful `generate`.
#[derive(Debug, Clone)]
pub struct Generated {
    pub path: PathBuf,
    pub context: ValidationContext,
    pub snapshot: DeploymentSnapshot,
    pub defaults: EffectiveDefaults,
}

/// Resolve, validate, reconcile and write the samconfig for `request`.
///
/// Nothing is written unless every step succeeds.
pub fn generate(
    layout: &Layout,
    request: &Request,
    remote: &dyn RemoteSnapshotSource,
    resolver: &mut dyn ConflictResolver,
) -> Result<Generated> {
    let ctx = request.context()?;
    let store = SamconfigStore::new(&layout.samconfig_dir);

    let mut local = store.load(&ctx)?;
    if request.check_stack {
        let observed = remote.fetch(&ctx.stack_name(), &ctx.stage_id)?;
        local = reconcile(local, observed, &ctx.stage_id, resolver)?.into_snapshot();
    }

    let templates_dir = layout.templates_for(ctx.infra_type);
    let recorded = local.as_ref().and_then(DeploymentSnapshot::template_name);
    let file = template::select(&templates_dir, request.template.as_deref(), recorded)?;
    let loaded = template::load(&templates_dir, &file)?;

    let defaults = EffectiveDefaults::load(&layout.defaults_dir, &ctx)?;
    let resolved = defaults.resolved();

    let candidates = parameter_defaults(&ctx, &loaded.schema, &resolved, local.as_ref());
    let mut source = MapSource::new(request.values.clone());
    let collected = collect(ctx.clone(), &loaded.schema, &candidates, &mut source)?;

    let mut deploy_parameters = atlantis_defaults(&resolved, local.as_ref());
    deploy_parameters.extend(request.deploy.clone());

    let custom_tags = tags::merge(&tag_defaults(&ctx, &resolved, local.as_ref()), &request.tags);

    let snapshot = assemble(&AssemblyInput {
        invocation: &ctx,
        schema: &loaded.schema,
        template: &loaded.info,
        parameters: &collected.values,
        deploy_parameters: &deploy_parameters,
        custom_tags: &custom_tags,
        local: local.as_ref(),
        apply_to_all: request.apply_to_all,
    })?;

    let render = RenderContext::new(&collected.context).with_profile(&request.profile);
    let path = store.save(&collected.context, &snapshot, &render)?;

    Ok(Generated {
        path,
        context: collected.context,
        snapshot,
        defaults,
    })
}

/// Compare the local samconfig with the deployed stack.
///
/// A missing samconfig or stack compares as empty.
pub fn diff(
    layout: &Layout,
    request: &Request,
    remote: &dyn RemoteSnapshotSource,
) -> Result<DiffReport> {
    let ctx = request.context()?;
    let local = SamconfigStore::new(&layout.samconfig_dir)
        .load(&ctx)?
        .unwrap_or_default();
    let observed = remote.fetch(&ctx.stack_name(), &ctx.stage_id)?;
    if observed.is_none() {
        info!("Stack {} not found, comparing against nothing", ctx.stack_name());
    }
    Ok(diff_observed(&local, observed.as_ref(), &ctx.stage_id))
}

/// Resolved defaults for `request`, with provenance.
pub fn defaults(layout: &Layout, request: &Request) -> Result<EffectiveDefaults> {
    EffectiveDefaults::load(&layout.defaults_dir, &request.context()?)
}

/// Validate supplied values against the parameters of a template file.
///
/// Values for parameters the template does not declare are ignored.
pub fn validate_values(
    template_path: &Path,
    values: &BTreeMap<String, String>,
) -> Result<Vec<SchemaViolation>> {
    let file = template_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ShellError::TemplateNotFound(template_path.display().to_string()))?;
    let dir = template_path.parent().unwrap_or_else(|| Path::new("."));
    let loaded = template::load(dir, &file)?;

    let mut violations = Vec::new();
    for (name, value) in values {
        match loaded.schema.get(name) {
            Some(definition) => {
                if let Err(v) = validate(name, value, definition) {
                    violations.push(v);
                }
            }
            None => warn!("{} does not declare parameter {}", file, name),
        }
    }
    Ok(violations)
}
