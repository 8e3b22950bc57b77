//! Parameter schema declared by an infrastructure template.
//!
//! Each definition carries a [`ParameterKind`] with one variant per type
//! family, so the type-specific validation rules are matched exhaustively.

pub mod deploy;
mod template;
mod validate;

pub use template::{extract_parameters_section, TemplateInfo, NO_VERSION};
pub use validate::{
    check, validate, validate_all, SchemaViolation, ValidationOutcome, ViolationKind,
};

use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use crate::error::{ConfigError, Result};

/// Resource-reference parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    KeyPairName,
    VpcId,
    SubnetId,
    SecurityGroupId,
}

impl ResourceKind {
    /// Literal prefix every identifier of this kind must carry.
    pub fn required_prefix(&self) -> Option<&'static str> {
        match self {
            ResourceKind::KeyPairName => None,
            ResourceKind::VpcId => Some("vpc-"),
            ResourceKind::SubnetId => Some("subnet-"),
            ResourceKind::SecurityGroupId => Some("sg-"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::KeyPairName => "KeyPair name",
            ResourceKind::VpcId => "VPC ID",
            ResourceKind::SubnetId => "Subnet ID",
            ResourceKind::SecurityGroupId => "Security Group ID",
        }
    }
}

/// Type family of a parameter and its family-specific bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
        /// Resolved from SSM Parameter Store at deploy time.
        ssm: bool,
    },
    Number {
        min_value: Option<f64>,
        max_value: Option<f64>,
        ssm: bool,
    },
    CommaDelimitedList,
    NumberList,
    Resource(ResourceKind),
    /// Any other declared type; only the generic rules apply.
    Other(String),
}

impl ParameterKind {
    /// The CloudFormation type name.
    pub fn type_name(&self) -> &str {
        match self {
            ParameterKind::String { ssm: false, .. } => "String",
            ParameterKind::String { ssm: true, .. } => "AWS::SSM::Parameter::Value<String>",
            ParameterKind::Number { ssm: false, .. } => "Number",
            ParameterKind::Number { ssm: true, .. } => "AWS::SSM::Parameter::Value<Number>",
            ParameterKind::CommaDelimitedList => "CommaDelimitedList",
            ParameterKind::NumberList => "List<Number>",
            ParameterKind::Resource(ResourceKind::KeyPairName) => "AWS::EC2::KeyPair::KeyName",
            ParameterKind::Resource(ResourceKind::VpcId) => "AWS::EC2::VPC::Id",
            ParameterKind::Resource(ResourceKind::SubnetId) => "AWS::EC2::Subnet::Id",
            ParameterKind::Resource(ResourceKind::SecurityGroupId) => "AWS::EC2::SecurityGroup::Id",
            ParameterKind::Other(name) => name,
        }
    }

    pub fn string() -> Self {
        ParameterKind::String {
            min_length: None,
            max_length: None,
            ssm: false,
        }
    }

    pub fn number() -> Self {
        ParameterKind::Number {
            min_value: None,
            max_value: None,
            ssm: false,
        }
    }
}

/// Schema entry for one configurable value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub kind: ParameterKind,
    pub allowed_pattern: Option<String>,
    pub allowed_values: Vec<String>,
    pub default: Option<String>,
    pub description: Option<String>,
    pub constraint_description: Option<String>,
    pub no_echo: bool,
}

impl ParameterDefinition {
    pub fn new(kind: ParameterKind) -> Self {
        Self {
            kind,
            allowed_pattern: None,
            allowed_values: Vec::new(),
            default: None,
            description: None,
            constraint_description: None,
            no_echo: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.allowed_pattern = Some(pattern.into());
        self
    }

    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// One-line summary of the declared constraints, for help output.
    pub fn constraint_summary(&self) -> String {
        let mut parts = vec![format!("Type: {}", self.kind.type_name())];
        match &self.kind {
            ParameterKind::String {
                min_length,
                max_length,
                ..
            } => {
                if let Some(min) = min_length {
                    parts.push(format!("MinLength: {}", min));
                }
                if let Some(max) = max_length {
                    parts.push(format!("MaxLength: {}", max));
                }
            }
            ParameterKind::Number {
                min_value,
                max_value,
                ..
            } => {
                if let Some(min) = min_value {
                    parts.push(format!("MinValue: {}", min));
                }
                if let Some(max) = max_value {
                    parts.push(format!("MaxValue: {}", max));
                }
            }
            _ => {}
        }
        parts.join(", ")
    }
}

/// Raw CloudFormation parameter as it appears in a template.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawParameter {
    #[serde(rename = "Type")]
    type_name: Option<String>,
    allowed_pattern: Option<String>,
    #[serde(default)]
    allowed_values: Vec<YamlValue>,
    min_length: Option<YamlValue>,
    max_length: Option<YamlValue>,
    min_value: Option<YamlValue>,
    max_value: Option<YamlValue>,
    default: Option<YamlValue>,
    description: Option<String>,
    constraint_description: Option<String>,
    no_echo: Option<YamlValue>,
}

fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn bound<T: std::str::FromStr>(name: &str, field: &str, value: &Option<YamlValue>) -> Result<Option<T>> {
    let Some(value) = value else {
        return Ok(None);
    };
    scalar_to_string(value)
        .and_then(|s| s.trim().parse::<T>().ok())
        .map(Some)
        .ok_or_else(|| {
            ConfigError::malformed(
                format!("parameter {}", name),
                format!("{} is not a valid number", field),
            )
        })
}

impl ParameterDefinition {
    fn from_raw(name: &str, raw: RawParameter) -> Result<Self> {
        let type_name = raw.type_name.unwrap_or_else(|| "String".to_string());
        let kind = match type_name.as_str() {
            "String" | "AWS::SSM::Parameter::Value<String>" => ParameterKind::String {
                min_length: bound(name, "MinLength", &raw.min_length)?,
                max_length: bound(name, "MaxLength", &raw.max_length)?,
                ssm: type_name != "String",
            },
            "Number" | "AWS::SSM::Parameter::Value<Number>" => ParameterKind::Number {
                min_value: bound(name, "MinValue", &raw.min_value)?,
                max_value: bound(name, "MaxValue", &raw.max_value)?,
                ssm: type_name != "Number",
            },
            "CommaDelimitedList" => ParameterKind::CommaDelimitedList,
            "List<Number>" => ParameterKind::NumberList,
            "AWS::EC2::KeyPair::KeyName" => ParameterKind::Resource(ResourceKind::KeyPairName),
            "AWS::EC2::VPC::Id" => ParameterKind::Resource(ResourceKind::VpcId),
            "AWS::EC2::Subnet::Id" => ParameterKind::Resource(ResourceKind::SubnetId),
            "AWS::EC2::SecurityGroup::Id" => ParameterKind::Resource(ResourceKind::SecurityGroupId),
            _ => ParameterKind::Other(type_name.clone()),
        };

        let allowed_values = raw
            .allowed_values
            .iter()
            .map(|v| {
                scalar_to_string(v).ok_or_else(|| {
                    ConfigError::malformed(
                        format!("parameter {}", name),
                        "AllowedValues must contain scalars",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let no_echo = raw
            .no_echo
            .as_ref()
            .and_then(scalar_to_string)
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            kind,
            allowed_pattern: raw.allowed_pattern,
            allowed_values,
            default: raw.default.as_ref().and_then(scalar_to_string),
            description: raw.description,
            constraint_description: raw.constraint_description,
            no_echo,
        })
    }
}

/// Template-ordered parameter definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    entries: Vec<(String, ParameterDefinition)>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: ParameterDefinition) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = definition,
            None => self.entries.push((name, definition)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterDefinition)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the `Parameters:` block of a template.
    ///
    /// A template without a `Parameters:` block has an empty schema.
    pub fn from_template(text: &str) -> Result<Self> {
        let Some(section) = extract_parameters_section(text) else {
            return Ok(Self::new());
        };

        let document: YamlValue = serde_yaml::from_str(&section)
            .map_err(|e| ConfigError::malformed("template Parameters", e.to_string()))?;

        let parameters = match document.get("Parameters") {
            Some(YamlValue::Mapping(map)) => map.clone(),
            Some(YamlValue::Null) | None => return Ok(Self::new()),
            Some(_) => {
                return Err(ConfigError::malformed(
                    "template Parameters",
                    "Parameters must be a mapping",
                ))
            }
        };

        let mut schema = Self::new();
        for (key, value) in parameters {
            let name = scalar_to_string(&key).ok_or_else(|| {
                ConfigError::malformed("template Parameters", "parameter names must be scalars")
            })?;
            let raw: RawParameter = serde_yaml::from_value(value).map_err(|e| {
                ConfigError::malformed(format!("parameter {}", name), e.to_string())
            })?;
            let definition = ParameterDefinition::from_raw(&name, raw)?;
            schema.insert(name, definition);
        }
        Ok(schema)
    }
}
