//! Layered defaults resolution
//!
//! Six optional layers are applied from least to most specific:
//! 1. `defaults.json`
//! 2. `<prefix>-defaults.json`
//! 3. `<prefix>-<project>-defaults.json`
//! 4. `<infra>/defaults.json`
//! 5. `<infra>/<prefix>-defaults.json`
//! 6. `<infra>/<prefix>-<project>-defaults.json`
//!
//! Merge semantics:
//! - Objects: deep-merge by key
//! - Tag lists: merged through [`tags::merge`](crate::tags::merge)
//! - Other arrays: REPLACE (last wins)
//! - Scalars: override (last wins)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::context::{stage_defaults, ValidationContext};
use crate::schema::ParameterSchema;
use crate::snapshot::DeploymentSnapshot;
use crate::tags::{self, TagSet};

/// Scope of a defaults layer, ordered by increasing specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerScope {
    Global,
    Prefix,
    PrefixProject,
    InfraType,
    InfraTypePrefix,
    InfraTypePrefixProject,
}

impl LayerScope {
    pub const ORDER: [LayerScope; 6] = [
        LayerScope::Global,
        LayerScope::Prefix,
        LayerScope::PrefixProject,
        LayerScope::InfraType,
        LayerScope::InfraTypePrefix,
        LayerScope::InfraTypePrefixProject,
    ];

    pub fn is_project_scoped(&self) -> bool {
        matches!(self, LayerScope::PrefixProject | LayerScope::InfraTypePrefixProject)
    }

    /// Path of this layer relative to the defaults directory, or `None`
    /// when the scope needs a project id the context does not have.
    pub fn relative_path(&self, ctx: &ValidationContext) -> Option<String> {
        let prefix = &ctx.prefix;
        let infra = ctx.infra_type.as_str();
        let project = ctx.project_id.as_deref();

        match (self, project) {
            (LayerScope::Global, _) => Some("defaults.json".to_string()),
            (LayerScope::Prefix, _) => Some(format!("{}-defaults.json", prefix)),
            (LayerScope::PrefixProject, Some(p)) => Some(format!("{}-{}-defaults.json", prefix, p)),
            (LayerScope::InfraType, _) => Some(format!("{}/defaults.json", infra)),
            (LayerScope::InfraTypePrefix, _) => Some(format!("{}/{}-defaults.json", infra, prefix)),
            (LayerScope::InfraTypePrefixProject, Some(p)) => {
                Some(format!("{}/{}-{}-defaults.json", infra, prefix, p))
            }
            (_, None) => None,
        }
    }
}

/// One optional, scoped defaults fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultsLayer {
    pub scope: LayerScope,
    pub fragment: Option<Value>,
}

impl DefaultsLayer {
    pub fn new(scope: LayerScope, fragment: Option<Value>) -> Self {
        Self { scope, fragment }
    }
}

fn as_tag_list(value: &Value) -> Option<TagSet> {
    match value {
        Value::Array(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

/// Deep merge two JSON values.
///
/// Merge semantics:
/// - Objects: deep-merge by key (recursive)
/// - Two tag lists: tag merge (protected keys keep the base value)
/// - Other arrays: REPLACE (second wins entirely)
/// - Scalars: override (second wins)
/// - Null: override (null can override any value)
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both objects: deep merge
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays: tag lists merge, anything else is replaced
        (base @ Value::Array(_), overlay @ Value::Array(_)) => {
            match (as_tag_list(&base), as_tag_list(&overlay)) {
                (Some(base_tags), Some(overlay_tags)) => {
                    serde_json::to_value(tags::merge(&base_tags, &overlay_tags)).unwrap_or(overlay)
                }
                _ => overlay,
            }
        }

        // Scalars and any other case: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge raw fragments in the order given, skipping absent ones.
pub fn resolve_fragments(fragments: &[Option<Value>]) -> Value {
    fragments
        .iter()
        .flatten()
        .cloned()
        .fold(Value::Object(serde_json::Map::new()), deep_merge)
}

/// Merge scoped layers in specificity order, skipping absent ones.
///
/// Layers sharing a scope keep their relative order.
pub fn resolve(layers: &[DefaultsLayer]) -> Value {
    let mut ordered: Vec<&DefaultsLayer> = layers.iter().collect();
    ordered.sort_by_key(|layer| layer.scope);
    ordered
        .into_iter()
        .filter_map(|layer| layer.fragment.clone())
        .fold(Value::Object(serde_json::Map::new()), deep_merge)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_map(section: &str, value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(value) = value else {
        return BTreeMap::new();
    };
    let Some(map) = value.as_object() else {
        warn!("Ignoring defaults section '{}': expected an object", section);
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| match scalar_string(v) {
            Some(s) => Some((k.clone(), s)),
            None => {
                warn!("Ignoring non-scalar default {}.{}", section, k);
                None
            }
        })
        .collect()
}

/// Typed view of a resolved defaults document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDefaults {
    /// Defaults for system-level deploy parameters (`s3_bucket`, `region`, ...)
    pub atlantis: BTreeMap<String, String>,
    pub parameter_overrides: BTreeMap<String, String>,
    pub tags: TagSet,
}

impl ResolvedDefaults {
    pub fn from_value(value: &Value) -> Self {
        let tags = match value.get("tags") {
            None => TagSet::new(),
            Some(raw) => as_tag_list(raw).unwrap_or_else(|| {
                warn!("Ignoring defaults 'tags': expected a list of Key/Value objects");
                TagSet::new()
            }),
        };

        Self {
            atlantis: string_map("atlantis", value.get("atlantis")),
            parameter_overrides: string_map("parameter_overrides", value.get("parameter_overrides")),
            tags,
        }
    }

    pub fn from_layers(layers: &[DefaultsLayer]) -> Self {
        Self::from_value(&resolve(layers))
    }
}

/// Candidate default for every parameter, most specific source last:
/// stage-derived values, resolved defaults, the local snapshot's stage
/// overrides, then invocation identity for parameters the schema declares.
pub fn parameter_defaults(
    ctx: &ValidationContext,
    schema: &ParameterSchema,
    resolved: &ResolvedDefaults,
    local: Option<&DeploymentSnapshot>,
) -> BTreeMap<String, String> {
    let mut defaults = stage_defaults(&ctx.stage_id);
    defaults.extend(resolved.parameter_overrides.clone());

    if let Some(deployment) = local.and_then(|s| s.deployments.get(&ctx.stage_id)) {
        defaults.extend(deployment.parameter_overrides.clone());
    }

    if !ctx.prefix.is_empty() {
        if schema.contains("Prefix") {
            defaults.insert("Prefix".to_string(), ctx.prefix.clone());
        }
        if schema.contains("PrefixUpper") {
            defaults.insert("PrefixUpper".to_string(), ctx.prefix.to_uppercase());
        }
    }
    if let Some(ref project) = ctx.project_id {
        if schema.contains("ProjectId") {
            defaults.insert("ProjectId".to_string(), project.clone());
        }
    }
    if !ctx.is_default_stage() && schema.contains("StageId") {
        defaults.insert("StageId".to_string(), ctx.stage_id.clone());
    }

    defaults
}

/// Resolved default tags with the local snapshot's stage tags merged on top.
pub fn tag_defaults(
    ctx: &ValidationContext,
    resolved: &ResolvedDefaults,
    local: Option<&DeploymentSnapshot>,
) -> TagSet {
    match local.and_then(|s| s.deployments.get(&ctx.stage_id)) {
        Some(deployment) => tags::merge(&resolved.tags, &deployment.tags),
        None => resolved.tags.clone(),
    }
}

/// System deploy-parameter defaults with the local snapshot's values on top.
pub fn atlantis_defaults(
    resolved: &ResolvedDefaults,
    local: Option<&DeploymentSnapshot>,
) -> BTreeMap<String, String> {
    let mut defaults = resolved.atlantis.clone();
    if let Some(snapshot) = local {
        defaults.extend(snapshot.atlantis.clone());
    }
    defaults
}
