//! Parameter collection.
//!
//! Walks a schema in declaration order, asking a [`ValueSource`] for each
//! value, validating it, and threading a new [`ValidationContext`] through
//! every accepted identity parameter.

use std::collections::BTreeMap;

use tracing::debug;

use crate::context::{stage_defaults, ValidationContext};
use crate::error::{ConfigError, Result};
use crate::schema::{validate, ParameterDefinition, ParameterSchema, SchemaViolation};

/// Derived from the accepted `Prefix`, never asked for.
const PREFIX_UPPER: &str = "PrefixUpper";

/// What a source is asked to supply.
#[derive(Debug, Clone, Copy)]
pub struct ValueRequest<'a> {
    pub name: &'a str,
    pub definition: &'a ParameterDefinition,
    pub default: Option<&'a str>,
    pub context: &'a ValidationContext,
}

/// Supplier of candidate values, typically the shell.
pub trait ValueSource {
    /// Candidate for `request.name`. An empty string means "use the default".
    fn provide(&mut self, request: &ValueRequest<'_>) -> Result<String>;

    /// Called when a candidate was rejected. `Ok` asks again; `Err` aborts.
    fn rejected(&mut self, violation: &SchemaViolation) -> Result<()> {
        Err(violation.clone().into())
    }
}

/// Non-interactive source answering from a fixed map.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

impl ValueSource for MapSource {
    fn provide(&mut self, request: &ValueRequest<'_>) -> Result<String> {
        Ok(self.values.get(request.name).cloned().unwrap_or_default())
    }
}

/// Accepted values and the context they produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub context: ValidationContext,
    pub values: BTreeMap<String, String>,
}

/// Collect a value for every schema parameter.
///
/// `defaults` holds the candidate default per parameter (see
/// [`parameter_defaults`](crate::defaults::parameter_defaults)); a
/// definition's own default applies when it has none.
pub fn collect(
    context: ValidationContext,
    schema: &ParameterSchema,
    defaults: &BTreeMap<String, String>,
    source: &mut dyn ValueSource,
) -> Result<Collected> {
    let mut defaults = defaults.clone();
    let mut context = context;
    let mut values = BTreeMap::new();

    for (name, definition) in schema.iter() {
        if name == PREFIX_UPPER {
            if let Some(prefix) = values.get("Prefix").map(|p: &String| p.to_uppercase()) {
                validate(name, &prefix, definition)?;
                values.insert(name.to_string(), prefix);
                continue;
            }
        }

        let value = loop {
            let default = defaults
                .get(name)
                .map(String::as_str)
                .or(definition.default.as_deref());
            let request = ValueRequest {
                name,
                definition,
                default,
                context: &context,
            };
            let input = source.provide(&request)?;
            let candidate = if input.is_empty() {
                default.unwrap_or_default().to_string()
            } else {
                input
            };

            match validate(name, &candidate, definition) {
                Ok(()) => break candidate,
                Err(violation) => source.rejected(&violation)?,
            }
        };

        let next = context.accept(name, &value);
        if next.stage_id != context.stage_id {
            debug!("Stage changed to {}, recomputing stage defaults", next.stage_id);
            defaults.extend(stage_defaults(&next.stage_id));
        }
        context = next;
        values.insert(name.to_string(), value);
    }

    if context.prefix.is_empty() {
        return Err(ConfigError::fatal("Prefix is required"));
    }

    Ok(Collected { context, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InfraType;
    use crate::schema::{ParameterKind, ViolationKind};

    fn schema() -> ParameterSchema {
        let mut schema = ParameterSchema::new();
        schema.insert("Prefix", ParameterDefinition::new(ParameterKind::string()));
        schema.insert("PrefixUpper", ParameterDefinition::new(ParameterKind::string()));
        schema.insert("ProjectId", ParameterDefinition::new(ParameterKind::string()));
        schema.insert("StageId", ParameterDefinition::new(ParameterKind::string()));
        schema.insert(
            "DeployEnvironment",
            ParameterDefinition::new(ParameterKind::string())
                .with_allowed_values(["DEV", "TEST", "PROD"]),
        );
        schema.insert(
            "Memory",
            ParameterDefinition::new(ParameterKind::Number {
                min_value: Some(128.0),
                max_value: Some(1024.0),
                ssm: false,
            })
            .with_default("256"),
        );
        schema
    }

    fn ctx() -> ValidationContext {
        ValidationContext::from_invocation(InfraType::Network, "acme", Some("widget"), Some("test"))
            .unwrap()
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Answers from a queue per parameter and counts rejections.
    struct Scripted {
        answers: BTreeMap<String, Vec<String>>,
        rejections: Vec<SchemaViolation>,
    }

    impl ValueSource for Scripted {
        fn provide(&mut self, request: &ValueRequest<'_>) -> Result<String> {
            Ok(self
                .answers
                .get_mut(request.name)
                .and_then(|queue| (!queue.is_empty()).then(|| queue.remove(0)))
                .unwrap_or_default())
        }

        fn rejected(&mut self, violation: &SchemaViolation) -> Result<()> {
            self.rejections.push(violation.clone());
            Ok(())
        }
    }

    #[test]
    fn test_defaults_used_for_empty_input() {
        let defaults = map(&[
            ("Prefix", "acme"),
            ("ProjectId", "widget"),
            ("StageId", "test"),
            ("DeployEnvironment", "TEST"),
        ]);
        let collected = collect(ctx(), &schema(), &defaults, &mut MapSource::default()).unwrap();
        assert_eq!(collected.values["Prefix"], "acme");
        assert_eq!(collected.values["PrefixUpper"], "ACME");
        assert_eq!(collected.values["Memory"], "256");
        assert_eq!(collected.context, ctx());
    }

    #[test]
    fn test_accepted_identity_threads_context() {
        let defaults = map(&[("Prefix", "acme"), ("ProjectId", "widget"), ("StageId", "test")]);
        let mut source = MapSource::new(map(&[("Prefix", "beta"), ("StageId", "prod")]));
        let collected = collect(ctx(), &schema(), &defaults, &mut source).unwrap();

        assert_eq!(collected.context.prefix, "beta");
        assert_eq!(collected.context.stage_id, "prod");
        assert_eq!(collected.values["PrefixUpper"], "BETA");
        // stage change recomputes stage-derived defaults
        assert_eq!(collected.values["DeployEnvironment"], "PROD");
        assert_eq!(collected.context.stack_name(), "beta-widget-prod-network");
    }

    #[test]
    fn test_map_source_aborts_on_violation() {
        let defaults = map(&[("Prefix", "acme"), ("DeployEnvironment", "TEST")]);
        let mut source = MapSource::new(map(&[("Memory", "4096")]));
        let err = collect(ctx(), &schema(), &defaults, &mut source).unwrap_err();
        match err {
            ConfigError::SchemaViolation(v) => {
                assert_eq!(v.parameter, "Memory");
                assert!(matches!(v.kind, ViolationKind::AboveMaximum { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejected_value_is_asked_again() {
        let defaults = map(&[("Prefix", "acme"), ("DeployEnvironment", "TEST")]);
        let mut source = Scripted {
            answers: BTreeMap::from([(
                "Memory".to_string(),
                vec!["lots".to_string(), "512".to_string()],
            )]),
            rejections: Vec::new(),
        };
        let collected = collect(ctx(), &schema(), &defaults, &mut source).unwrap();
        assert_eq!(collected.values["Memory"], "512");
        assert_eq!(source.rejections.len(), 1);
        assert_eq!(source.rejections[0].kind, ViolationKind::NotANumber);
    }
}
