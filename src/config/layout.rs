//! On-disk workspace layout.

use std::path::{Path, PathBuf};

use atlantis_core::InfraType;

pub const DEFAULTS_DIR: &str = "defaults";
pub const TEMPLATES_DIR: &str = "local-templates";
pub const SAMCONFIG_DIR: &str = "samconfigs";
pub const STACKS_DIR: &str = "stacks";

/// Directories the shell reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub defaults_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub samconfig_dir: PathBuf,
    /// Observations of deployed stacks, one JSON file per stack
    pub stacks_dir: PathBuf,
}

impl Layout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            defaults_dir: root.join(DEFAULTS_DIR),
            templates_dir: root.join(TEMPLATES_DIR),
            samconfig_dir: root.join(SAMCONFIG_DIR),
            stacks_dir: root.join(STACKS_DIR),
        }
    }

    pub fn with_defaults_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.defaults_dir = dir.into();
        self
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    pub fn with_samconfig_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.samconfig_dir = dir.into();
        self
    }

    pub fn with_stacks_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stacks_dir = dir.into();
        self
    }

    /// `local-templates/<infra_type>`
    pub fn templates_for(&self, infra_type: InfraType) -> PathBuf {
        self.templates_dir.join(infra_type.as_str())
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(".")
    }
}
