use std::collections::BTreeMap;

use toml::{Table, Value};
use tracing::warn;

use crate::codec::{parse_overrides, parse_tags};
use crate::error::{ConfigError, Result};
use crate::snapshot::{Deployment, DeploymentSnapshot};
use crate::tags::TagSet;

use super::{ATLANTIS_SECTION, PARAMETER_OVERRIDES, TAGS};

fn deploy_parameters<'a>(section: &'a Value) -> Option<&'a Table> {
    section.get("deploy")?.get("parameters")?.as_table()
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

fn string_entry(params: &Table, key: &str) -> std::result::Result<String, String> {
    match params.get(key) {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(format!("{} must be a string, found {}", key, other.type_str())),
    }
}

fn parse_stage(stage: &str, params: &Table) -> Result<Deployment> {
    let overrides = string_entry(params, PARAMETER_OVERRIDES)
        .map_err(|reason| ConfigError::malformed(stage, reason))?;
    let tags = string_entry(params, TAGS).map_err(|reason| ConfigError::malformed(stage, reason))?;

    let mut deploy = BTreeMap::new();
    for (key, value) in params {
        if key == PARAMETER_OVERRIDES || key == TAGS {
            continue;
        }
        match scalar(value) {
            Some(v) => {
                deploy.insert(key.clone(), v);
            }
            None => warn!("Ignoring non-scalar deploy parameter {}.{}", stage, key),
        }
    }

    Ok(Deployment {
        deploy,
        parameter_overrides: if overrides.is_empty() {
            BTreeMap::new()
        } else {
            parse_overrides(&overrides)?
        },
        tags: if tags.is_empty() {
            TagSet::new()
        } else {
            parse_tags(&tags)?
        },
    })
}

/// Parse a samconfig document back into a snapshot.
///
/// A document that is not valid TOML is fatal. A stage section that cannot
/// be decoded is skipped with a warning.
pub fn parse(text: &str) -> Result<DeploymentSnapshot> {
    let doc: Table = toml::from_str(text)
        .map_err(|e| ConfigError::fatal(format!("Unparseable samconfig document: {}", e)))?;

    let mut snapshot = DeploymentSnapshot::default();

    if let Some(section) = doc.get(ATLANTIS_SECTION) {
        match deploy_parameters(section) {
            Some(params) => {
                for (key, value) in params {
                    match scalar(value) {
                        Some(v) => {
                            snapshot.atlantis.insert(key.clone(), v);
                        }
                        None => warn!("Ignoring non-scalar atlantis parameter {}", key),
                    }
                }
            }
            None => warn!("Ignoring atlantis section without deploy.parameters"),
        }
    }

    for (stage, section) in &doc {
        if stage == ATLANTIS_SECTION || !section.is_table() {
            continue;
        }
        let Some(params) = deploy_parameters(section) else {
            warn!("Skipping section '{}' without deploy.parameters", stage);
            continue;
        };
        match parse_stage(stage, params) {
            Ok(deployment) => {
                snapshot.deployments.insert(stage.clone(), deployment);
            }
            Err(e) => warn!("Skipping invalid deployment section '{}': {}", stage, e),
        }
    }

    Ok(snapshot)
}
