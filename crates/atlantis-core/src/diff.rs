//! Field-level comparison of a local and a remote snapshot for one stage.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::deploy::{CONFIRM_CHANGESET, S3_BUCKET};
use crate::snapshot::DeploymentSnapshot;

/// Rendering of a value absent on one side.
pub const ABSENT: &str = "None";

/// Deploy parameters copied from local into remote before comparison, so
/// that operational differences never count as a mismatch.
pub const NON_ESSENTIAL_KEYS: &[&str] = &[CONFIRM_CHANGESET, S3_BUCKET];

/// Comparison domain of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    ParameterOverrides,
    DeployParameters,
    Tags,
}

impl Domain {
    pub const ALL: [Domain; 3] = [
        Domain::ParameterOverrides,
        Domain::DeployParameters,
        Domain::Tags,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Domain::ParameterOverrides => "Parameter Overrides",
            Domain::DeployParameters => "Atlantis Deploy Parameters",
            Domain::Tags => "Tags",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub key: String,
    pub local: String,
    pub remote: String,
    pub matches: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainReport {
    pub domain: Domain,
    /// Sorted by key
    pub fields: Vec<FieldComparison>,
}

impl DomainReport {
    pub fn has_differences(&self) -> bool {
        self.fields.iter().any(|f| !f.matches)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &FieldComparison> {
        self.fields.iter().filter(|f| !f.matches)
    }
}

/// Complete, deterministic field report for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    pub stage: String,
    pub has_differences: bool,
    pub domains: Vec<DomainReport>,
}

impl DiffReport {
    pub fn domain(&self, domain: Domain) -> Option<&DomainReport> {
        self.domains.iter().find(|d| d.domain == domain)
    }

    /// Look up the comparison for `key` within `domain`.
    pub fn field(&self, domain: Domain, key: &str) -> Option<&FieldComparison> {
        self.domain(domain)?.fields.iter().find(|f| f.key == key)
    }

    pub fn mismatch_count(&self) -> usize {
        self.domains.iter().map(|d| d.mismatches().count()).sum()
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stage: {}", self.stage)?;
        for domain in &self.domains {
            writeln!(f, "\n{}:", domain.domain.label())?;
            if domain.fields.is_empty() {
                writeln!(f, "  (none)")?;
            }
            for field in &domain.fields {
                let marker = if field.matches { "  " } else { "! " };
                writeln!(
                    f,
                    "{}{}: local={} remote={}",
                    marker, field.key, field.local, field.remote
                )?;
            }
        }
        Ok(())
    }
}

fn compare(domain: Domain, local: &BTreeMap<&str, &str>, remote: &BTreeMap<&str, &str>) -> DomainReport {
    let keys: BTreeSet<&str> = local.keys().chain(remote.keys()).copied().collect();
    let fields = keys
        .into_iter()
        .map(|key| {
            let local = local.get(key).copied().unwrap_or(ABSENT);
            let remote = remote.get(key).copied().unwrap_or(ABSENT);
            FieldComparison {
                key: key.to_string(),
                local: local.to_string(),
                remote: remote.to_string(),
                matches: local == remote,
            }
        })
        .collect();
    DomainReport { domain, fields }
}

fn borrowed(map: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

/// Compare `local` against `remote` for `stage`.
///
/// Neither input is modified; the non-essential copy is applied to a view
/// of the remote deploy parameters.
pub fn diff(local: &DeploymentSnapshot, remote: &DeploymentSnapshot, stage: &str) -> DiffReport {
    let local_stage = local.deployments.get(stage);
    let remote_stage = remote.deployments.get(stage);
    let empty = BTreeMap::new();

    let overrides = compare(
        Domain::ParameterOverrides,
        &borrowed(local_stage.map(|d| &d.parameter_overrides).unwrap_or(&empty)),
        &borrowed(remote_stage.map(|d| &d.parameter_overrides).unwrap_or(&empty)),
    );

    let local_deploy = borrowed(&local.atlantis);
    let mut remote_deploy = borrowed(&remote.atlantis);
    for &key in NON_ESSENTIAL_KEYS {
        if let Some(&value) = local_deploy.get(key) {
            remote_deploy.insert(key, value);
        }
    }
    let deploy = compare(Domain::DeployParameters, &local_deploy, &remote_deploy);

    let tags = compare(
        Domain::Tags,
        &local_stage.map(|d| d.tags.to_map()).unwrap_or_default(),
        &remote_stage.map(|d| d.tags.to_map()).unwrap_or_default(),
    );

    let domains = vec![overrides, deploy, tags];
    DiffReport {
        stage: stage.to_string(),
        has_differences: domains.iter().any(DomainReport::has_differences),
        domains,
    }
}

/// Compare against a remote observation that may not exist.
pub fn diff_observed(
    local: &DeploymentSnapshot,
    remote: Option<&DeploymentSnapshot>,
    stage: &str,
) -> DiffReport {
    match remote {
        Some(remote) => diff(local, remote, stage),
        None => diff(local, &DeploymentSnapshot::default(), stage),
    }
}
