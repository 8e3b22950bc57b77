//! Behavioural properties of the configuration engine
//!
//! These exercise the pure engine through its public API only; no files are
//! touched.

use std::collections::BTreeMap;

use atlantis_core::defaults::{deep_merge, resolve_fragments};
use atlantis_core::samconfig::{self, RenderContext};
use atlantis_core::schema::validate;
use atlantis_core::{
    diff, tags, Deployment, DeploymentSnapshot, Domain, InfraType, ParameterDefinition,
    ParameterKind, Tag, TagSet, ValidationContext,
};
use serde_json::json;

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn snapshot(stage: &str, overrides: &[(&str, &str)], tags: &[(&str, &str)]) -> DeploymentSnapshot {
    let mut snapshot = DeploymentSnapshot::default();
    snapshot.atlantis = map(&[("region", "us-east-1"), ("s3_bucket", "artifacts")]);
    snapshot.deployments.insert(
        stage.to_string(),
        Deployment {
            deploy: BTreeMap::new(),
            parameter_overrides: map(overrides),
            tags: tags.iter().copied().collect(),
        },
    );
    snapshot
}

// =============================================================================
// Defaults resolution
// =============================================================================

#[test]
fn test_more_specific_layer_wins() {
    let resolved = resolve_fragments(&[
        Some(json!({"atlantis": {"region": "us-east-1", "s3_bucket": "global"}})),
        None,
        Some(json!({"atlantis": {"s3_bucket": "acme"}})),
    ]);
    assert_eq!(
        resolved,
        json!({"atlantis": {"region": "us-east-1", "s3_bucket": "acme"}})
    );
}

#[test]
fn test_merge_is_idempotent() {
    let value = json!({
        "atlantis": {"region": "us-east-1"},
        "parameter_overrides": {"Memory": "512"},
        "tags": [{"Key": "Team", "Value": "web"}],
        "subnets": ["a", "b"]
    });
    assert_eq!(deep_merge(value.clone(), value.clone()), value);
}

#[test]
fn test_plain_arrays_replace() {
    let merged = deep_merge(json!({"subnets": ["a", "b"]}), json!({"subnets": ["c"]}));
    assert_eq!(merged, json!({"subnets": ["c"]}));
}

#[test]
fn test_tag_lists_keep_protected_base() {
    let base = json!({"tags": [
        {"Key": "Atlantis:App", "Value": "base"},
        {"Key": "Team", "Value": "web"}
    ]});
    let overlay = json!({"tags": [
        {"Key": "Atlantis:App", "Value": "overlay"},
        {"Key": "Team", "Value": "data"},
        {"Key": "Owner", "Value": "me"}
    ]});
    let merged = deep_merge(base, overlay);
    assert_eq!(
        merged,
        json!({"tags": [
            {"Key": "Atlantis:App", "Value": "base"},
            {"Key": "Team", "Value": "data"},
            {"Key": "Owner", "Value": "me"}
        ]})
    );
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_allowed_values_checked_before_length() {
    let mut definition = ParameterDefinition::new(ParameterKind::String {
        min_length: Some(10),
        max_length: None,
        ssm: false,
    })
    .with_allowed_values(["DEV", "PROD"]);
    definition.allowed_pattern = Some("^[A-Z]+$".to_string());

    let err = validate("Env", "qa", &definition).unwrap_err();
    assert_eq!(err.reason(), "Value must be one of: DEV, PROD");
}

#[test]
fn test_numeric_bounds() {
    let definition = ParameterDefinition::new(ParameterKind::Number {
        min_value: Some(1.0),
        max_value: Some(3.0),
        ssm: false,
    });
    assert!(validate("MaxAzs", "3", &definition).is_ok());
    assert!(validate("MaxAzs", "1.5", &definition).is_ok());
    assert_eq!(
        validate("MaxAzs", "4", &definition).unwrap_err().reason(),
        "Number must be no more than 3"
    );
    assert_eq!(
        validate("MaxAzs", "many", &definition).unwrap_err().reason(),
        "Value must be a number"
    );
}

#[test]
fn test_empty_passes_with_default() {
    let definition = ParameterDefinition::new(ParameterKind::string())
        .with_pattern("^[a-z]+$")
        .with_default("acme");
    assert!(validate("Prefix", "", &definition).is_ok());
}

// =============================================================================
// Tags
// =============================================================================

#[test]
fn test_system_tags_cannot_be_overridden() {
    let system: TagSet = [("atlantis:Prefix", "acme"), ("Atlantis", "network-infrastructure")]
        .into_iter()
        .collect();
    let custom: TagSet = [
        Tag::new("atlantis:Prefix", "other"),
        Tag::new("Atlantis", "mine"),
        Tag::new("Atlantis:App", "new"),
        Tag::new("Team", "web"),
    ]
    .into_iter()
    .collect();

    let merged = tags::merge(&system, &custom);
    assert_eq!(merged.get("atlantis:Prefix"), Some("acme"));
    assert_eq!(merged.get("Atlantis"), Some("network-infrastructure"));
    // protected keys new to the base are still added
    assert_eq!(merged.get("Atlantis:App"), Some("new"));
    assert_eq!(merged.get("Team"), Some("web"));
    assert_eq!(merged.len(), 4);
}

// =============================================================================
// Diff
// =============================================================================

#[test]
fn test_identical_snapshots_have_no_differences() {
    let local = snapshot("test", &[("Memory", "512")], &[("Team", "web")]);
    let report = diff(&local, &local.clone(), "test");
    assert!(!report.has_differences);
}

#[test]
fn test_single_change_is_reported_once() {
    let local = snapshot("test", &[("Memory", "512"), ("Timeout", "30")], &[]);
    let remote = snapshot("test", &[("Memory", "1024"), ("Timeout", "30")], &[]);

    let report = diff(&local, &remote, "test");
    assert!(report.has_differences);
    assert_eq!(report.mismatch_count(), 1);

    let field = report.field(Domain::ParameterOverrides, "Memory").unwrap();
    assert_eq!((field.local.as_str(), field.remote.as_str()), ("512", "1024"));
}

#[test]
fn test_non_essential_deploy_keys_ignored() {
    let mut local = snapshot("test", &[], &[]);
    local
        .atlantis
        .insert("confirm_changeset".to_string(), "true".to_string());
    let mut remote = snapshot("test", &[], &[]);
    remote.atlantis.remove("s3_bucket");

    let report = diff(&local, &remote, "test");
    assert!(!report.has_differences);
    // the inputs are left alone
    assert!(!remote.atlantis.contains_key("s3_bucket"));
}

// =============================================================================
// samconfig documents
// =============================================================================

#[test]
fn test_document_reparses_to_same_snapshot() {
    let mut snapshot = snapshot(
        "test",
        &[("Owner", "platform team"), ("Quote", "say \"hi\"")],
        &[("Team", "web"), ("atlantis:Prefix", "acme")],
    );
    snapshot.deployments.insert(
        "prod".to_string(),
        Deployment {
            deploy: map(&[("stack_name", "acme-widget-prod-network")]),
            parameter_overrides: map(&[("Owner", "ops")]),
            tags: TagSet::new(),
        },
    );

    let ctx = ValidationContext::from_invocation(
        InfraType::Network,
        "acme",
        Some("widget"),
        Some("test"),
    )
    .unwrap();
    let document = samconfig::to_document(&samconfig::render(&snapshot, &RenderContext::new(&ctx)));
    assert_eq!(samconfig::parse(&document).unwrap(), snapshot);
}

#[test]
fn test_stage_sections_follow_lifecycle_order() {
    let ordered = samconfig::stage_order(["prod", "test", "beta", "dev", "stage", "qa", "default"]);
    assert_eq!(ordered, vec!["default", "dev", "test", "beta", "stage", "prod", "qa"]);
}
