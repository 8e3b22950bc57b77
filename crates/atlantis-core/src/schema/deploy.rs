//! Checks for the system-level deploy parameters (`atlantis` section).

use std::collections::BTreeMap;

use crate::context::InfraType;

use super::{SchemaViolation, ViolationKind};

/// Regions a deployment may target.
pub const VALID_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "ca-central-1",
    "ca-west-1",
    "mx-central-1",
    "sa-east-1",
    "ap-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "me-south-1",
    "me-central-1",
    "il-central-1",
    "af-south-1",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "eu-central-2",
];

pub const S3_BUCKET: &str = "s3_bucket";
pub const REGION: &str = "region";
pub const CONFIRM_CHANGESET: &str = "confirm_changeset";
pub const ROLE_ARN: &str = "role_arn";

fn violation(name: &str, reason: &str) -> SchemaViolation {
    SchemaViolation::new(
        name,
        ViolationKind::Constraint {
            description: reason.to_string(),
        },
    )
}

pub fn is_valid_s3_bucket(bucket: &str) -> bool {
    (3..=63).contains(&bucket.len())
        && bucket
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && bucket.chars().any(|c| c.is_ascii_lowercase())
        && !bucket.starts_with('-')
        && !bucket.ends_with('-')
}

pub fn is_valid_region(region: &str) -> bool {
    VALID_REGIONS.contains(&region)
}

pub fn is_valid_role_arn(arn: &str) -> bool {
    arn.starts_with("arn:aws:iam::") && arn.contains(":role/") && arn.split(':').count() == 6
}

pub fn is_valid_boolean(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

/// Check one deploy parameter by name. Unknown names pass.
pub fn check_deploy_parameter(name: &str, value: &str) -> Result<(), SchemaViolation> {
    let (ok, reason) = match name {
        S3_BUCKET => (
            is_valid_s3_bucket(value),
            "3-63 characters, lowercase letters, numbers or hyphens, not starting or ending with a hyphen",
        ),
        REGION => (is_valid_region(value), "a valid AWS region (e.g. us-east-1)"),
        CONFIRM_CHANGESET => (is_valid_boolean(value), "'true' or 'false'"),
        ROLE_ARN => (
            is_valid_role_arn(value),
            "in the form arn:aws:iam::account-id:role/role-name",
        ),
        _ => (true, ""),
    };
    if ok {
        Ok(())
    } else {
        Err(violation(name, reason))
    }
}

/// Deploy parameters required for an infrastructure type.
pub fn required_deploy_parameters(infra_type: InfraType) -> Vec<&'static str> {
    let mut required = vec![S3_BUCKET, REGION, CONFIRM_CHANGESET];
    if infra_type == InfraType::Pipeline {
        required.push(ROLE_ARN);
    }
    required
}

/// Check a full set of deploy parameters, reporting every problem.
pub fn validate_deploy_parameters(
    infra_type: InfraType,
    params: &BTreeMap<String, String>,
) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    for name in required_deploy_parameters(infra_type) {
        match params.get(name).filter(|v| !v.is_empty()) {
            Some(value) => {
                if let Err(v) = check_deploy_parameter(name, value) {
                    violations.push(v);
                }
            }
            None => violations.push(SchemaViolation::new(name, ViolationKind::Missing)),
        }
    }
    violations
}
