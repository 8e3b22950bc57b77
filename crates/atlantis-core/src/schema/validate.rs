//! Ordered, early-exit validation of a candidate value.
//!
//! Rules run in a fixed order and the first failure is reported:
//! 1. empty input with a declared default is accepted
//! 2. allowed values
//! 3. allowed pattern (full match)
//! 4. type-family checks
//!
//! A value rejected by allowed values or pattern never reaches the looser
//! type checks.

use std::collections::BTreeMap;
use std::fmt;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::{ParameterDefinition, ParameterKind, ParameterSchema, ResourceKind};

/// Which rule rejected a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum ViolationKind {
    NotAllowed { allowed: Vec<String> },
    PatternMismatch { pattern: String },
    InvalidPattern { pattern: String, error: String },
    TooShort { min: usize },
    TooLong { max: usize },
    NotANumber,
    BelowMinimum { min: f64 },
    AboveMaximum { max: f64 },
    EmptyListItem,
    NonNumericListItem,
    EmptyResource { kind: String },
    MissingPrefix { kind: String, prefix: String },
    /// A constraint described in prose rather than by a pattern.
    Constraint { description: String },
    /// A required value was not supplied and no default applies.
    Missing,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::NotAllowed { allowed } => {
                write!(f, "Value must be one of: {}", allowed.join(", "))
            }
            ViolationKind::PatternMismatch { pattern } => {
                write!(f, "Value must match pattern: {}", pattern)
            }
            ViolationKind::InvalidPattern { pattern, error } => {
                write!(f, "Allowed pattern {} could not be compiled: {}", pattern, error)
            }
            ViolationKind::TooShort { min } => {
                write!(f, "String length must be at least {}", min)
            }
            ViolationKind::TooLong { max } => {
                write!(f, "String length must be no more than {}", max)
            }
            ViolationKind::NotANumber => f.write_str("Value must be a number"),
            ViolationKind::BelowMinimum { min } => write!(f, "Number must be at least {}", min),
            ViolationKind::AboveMaximum { max } => {
                write!(f, "Number must be no more than {}", max)
            }
            ViolationKind::EmptyListItem => {
                f.write_str("CommaDelimitedList cannot contain empty items")
            }
            ViolationKind::NonNumericListItem => f.write_str("All items must be valid numbers"),
            ViolationKind::EmptyResource { kind } => write!(f, "{} cannot be empty", kind),
            ViolationKind::MissingPrefix { kind, prefix } => {
                write!(f, "{} must start with '{}'", kind, prefix)
            }
            ViolationKind::Constraint { description } => {
                write!(f, "Value must be {}", description)
            }
            ViolationKind::Missing => f.write_str("A value is required"),
        }
    }
}

/// A value that failed its parameter definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid value for {parameter}: {kind}")]
pub struct SchemaViolation {
    pub parameter: String,
    pub kind: ViolationKind,
}

impl SchemaViolation {
    pub fn new(parameter: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            parameter: parameter.into(),
            kind,
        }
    }

    /// Human-readable reason without the parameter name.
    pub fn reason(&self) -> String {
        self.kind.to_string()
    }
}

/// The `{valid, reason}` pair handed to interactive callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: String,
}

impl From<Result<(), ViolationKind>> for ValidationOutcome {
    fn from(result: Result<(), ViolationKind>) -> Self {
        match result {
            Ok(()) => ValidationOutcome {
                valid: true,
                reason: "Valid".to_string(),
            },
            Err(kind) => ValidationOutcome {
                valid: false,
                reason: kind.to_string(),
            },
        }
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn check_pattern(pattern: &str, value: &str) -> Result<(), ViolationKind> {
    let anchored = format!("^(?:{})$", pattern);
    let re = Regex::new(&anchored).map_err(|e| ViolationKind::InvalidPattern {
        pattern: pattern.to_string(),
        error: e.to_string(),
    })?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ViolationKind::PatternMismatch {
            pattern: pattern.to_string(),
        })
    }
}

fn check_kind(kind: &ParameterKind, value: &str) -> Result<(), ViolationKind> {
    match kind {
        ParameterKind::String {
            min_length,
            max_length,
            ..
        } => {
            let len = value.chars().count();
            let min = min_length.unwrap_or(0);
            if len < min {
                return Err(ViolationKind::TooShort { min });
            }
            if let Some(max) = *max_length {
                if len > max {
                    return Err(ViolationKind::TooLong { max });
                }
            }
            Ok(())
        }
        ParameterKind::Number {
            min_value,
            max_value,
            ..
        } => {
            let n = parse_number(value).ok_or(ViolationKind::NotANumber)?;
            let min = min_value.unwrap_or(f64::NEG_INFINITY);
            let max = max_value.unwrap_or(f64::INFINITY);
            if n < min {
                return Err(ViolationKind::BelowMinimum { min });
            }
            if n > max {
                return Err(ViolationKind::AboveMaximum { max });
            }
            Ok(())
        }
        ParameterKind::CommaDelimitedList => {
            if value.split(',').any(|item| item.trim().is_empty()) {
                Err(ViolationKind::EmptyListItem)
            } else {
                Ok(())
            }
        }
        ParameterKind::NumberList => {
            if value.split(',').all(|item| parse_number(item).is_some()) {
                Ok(())
            } else {
                Err(ViolationKind::NonNumericListItem)
            }
        }
        ParameterKind::Resource(resource) => check_resource(*resource, value),
        ParameterKind::Other(_) => Ok(()),
    }
}

fn check_resource(resource: ResourceKind, value: &str) -> Result<(), ViolationKind> {
    if value.is_empty() {
        return Err(ViolationKind::EmptyResource {
            kind: resource.label().to_string(),
        });
    }
    match resource.required_prefix() {
        Some(prefix) if !value.starts_with(prefix) => Err(ViolationKind::MissingPrefix {
            kind: resource.label().to_string(),
            prefix: prefix.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Apply the ordered rule list to `value`.
pub fn check(value: &str, definition: &ParameterDefinition) -> Result<(), ViolationKind> {
    if value.is_empty() && definition.default.is_some() {
        return Ok(());
    }

    if !definition.allowed_values.is_empty()
        && !definition.allowed_values.iter().any(|v| v == value)
    {
        return Err(ViolationKind::NotAllowed {
            allowed: definition.allowed_values.clone(),
        });
    }

    if let Some(ref pattern) = definition.allowed_pattern {
        check_pattern(pattern, value)?;
    }

    check_kind(&definition.kind, value)
}

/// Validate `value` for the parameter `name`.
pub fn validate(
    name: &str,
    value: &str,
    definition: &ParameterDefinition,
) -> Result<(), SchemaViolation> {
    check(value, definition).map_err(|kind| SchemaViolation::new(name, kind))
}

/// Validate every schema parameter, collecting all violations.
///
/// A parameter with no value is checked as empty input, so it passes only
/// when a default is declared or its rules accept the empty string.
pub fn validate_all(
    schema: &ParameterSchema,
    values: &BTreeMap<String, String>,
) -> Vec<SchemaViolation> {
    schema
        .iter()
        .filter_map(|(name, definition)| {
            let value = values.get(name).map(String::as_str).unwrap_or("");
            validate(name, value, definition).err()
        })
        .collect()
}
