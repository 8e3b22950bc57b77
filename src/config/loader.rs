//! Resolved defaults with full provenance
//!
//! Captures the merged defaults document plus the layer files that
//! contributed to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use atlantis_core::defaults::{DefaultsLayer, LayerScope, ResolvedDefaults};
use atlantis_core::{ConfigError, ValidationContext};

use crate::error::{Result, ShellError};

/// Schema version for effective_defaults
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "atlantis-config/effective_defaults@1";

/// A contributing defaults file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerSource {
    pub scope: LayerScope,

    pub path: String,

    /// SHA-256 digest of raw file bytes
    pub digest: String,
}

/// A defaults file that exists but could not be used
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedLayer {
    pub scope: LayerScope,
    pub path: String,
    pub reason: String,
}

/// Resolved defaults with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveDefaults {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the defaults were resolved
    pub created_at: DateTime<Utc>,

    /// Identity the layers were selected for
    pub context: ValidationContext,

    /// The merged defaults document
    pub config: Value,

    /// Contributing layers in precedence order
    pub sources: Vec<LayerSource>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skipped: Vec<SkippedLayer>,
}

impl EffectiveDefaults {
    /// Load every layer that applies to `ctx` from `dir` and merge them.
    ///
    /// Missing files are not an error. A file that is not valid JSON is
    /// logged and skipped so the remaining layers still apply.
    pub fn load(dir: &Path, ctx: &ValidationContext) -> Result<Self> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();
        let mut skipped = Vec::new();

        for scope in LayerScope::ORDER {
            let Some(relative) = scope.relative_path(ctx) else {
                continue;
            };
            let path = dir.join(&relative);

            match Self::load_json_file(&path)? {
                None => debug!("No defaults at {}", path.display()),
                Some((Ok(value), digest)) => {
                    info!("Loaded defaults from {}", path.display());
                    layers.push(DefaultsLayer::new(scope, Some(value)));
                    sources.push(LayerSource {
                        scope,
                        path: path.to_string_lossy().to_string(),
                        digest,
                    });
                }
                Some((Err(e), _)) => {
                    warn!("Skipping defaults layer: {}", e);
                    skipped.push(SkippedLayer {
                        scope,
                        path: path.to_string_lossy().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            context: ctx.clone(),
            config: atlantis_core::defaults::resolve(&layers),
            sources,
            skipped,
        })
    }

    /// Read and parse a JSON file, returning the parse result and digest.
    ///
    /// `None` when the file does not exist.
    fn load_json_file(
        path: &Path,
    ) -> Result<Option<(std::result::Result<Value, ConfigError>, String)>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ShellError::io(path, e)),
        };

        // Compute digest
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let parsed = serde_json::from_slice::<Value>(&bytes)
            .map_err(|e| ConfigError::malformed(path.display().to_string(), e.to_string()))
            .and_then(|value| {
                if value.is_object() {
                    Ok(value)
                } else {
                    Err(ConfigError::malformed(
                        path.display().to_string(),
                        "top level must be an object",
                    ))
                }
            });

        Ok(Some((parsed, digest)))
    }

    /// Typed view of the merged document
    pub fn resolved(&self) -> ResolvedDefaults {
        ResolvedDefaults::from_value(&self.config)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}
