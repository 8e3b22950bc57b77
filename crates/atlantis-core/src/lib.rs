//! Configuration engine for Atlantis samconfig files.
//!
//! Everything in this crate is synchronous and free of I/O: layered defaults
//! resolution, parameter validation, tag merging, snapshot assembly, local
//! versus remote comparison, and samconfig rendering and parsing. File access
//! and user interaction belong to the caller.

pub mod codec;
pub mod collect;
pub mod context;
pub mod defaults;
pub mod diff;
pub mod error;
pub mod reconcile;
pub mod samconfig;
pub mod schema;
pub mod snapshot;
pub mod tags;

pub use collect::{collect, Collected, MapSource, ValueRequest, ValueSource};
pub use context::{InfraType, ValidationContext, DEFAULT_STAGE};
pub use defaults::{DefaultsLayer, LayerScope, ResolvedDefaults};
pub use diff::{diff, diff_observed, DiffReport, Domain, FieldComparison};
pub use error::{ConfigError, Result};
pub use reconcile::{reconcile, ConflictResolver, Conflict, ReconcileOutcome, Resolution};
pub use schema::{ParameterDefinition, ParameterKind, ParameterSchema, SchemaViolation, TemplateInfo};
pub use snapshot::{assemble, AssemblyInput, Deployment, DeploymentSnapshot};
pub use tags::{Tag, TagSet};
