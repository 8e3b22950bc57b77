//! samconfig files on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use atlantis_core::samconfig::{self, RenderContext};
use atlantis_core::{DeploymentSnapshot, ValidationContext};

use crate::error::{Result, ShellError};

/// Reads and writes `samconfigs/<prefix>/<project>/samconfig-*.toml`.
#[derive(Debug, Clone)]
pub struct SamconfigStore {
    dir: PathBuf,
}

impl SamconfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, ctx: &ValidationContext) -> PathBuf {
        let mut path = self.dir.join(&ctx.prefix);
        if let Some(ref project) = ctx.project_id {
            path.push(project);
        }
        path.join(samconfig::file_name(ctx))
    }

    /// Load the samconfig for `ctx`, or `None` when there is none yet.
    pub fn load(&self, ctx: &ValidationContext) -> Result<Option<DeploymentSnapshot>> {
        let path = self.path(ctx);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ShellError::io(&path, e)),
        };
        info!("Using samconfig file: {}", path.display());
        let snapshot = samconfig::parse(&text)?;
        Ok(Some(snapshot))
    }

    /// Write `snapshot` for `ctx`, creating directories as needed.
    pub fn save(
        &self,
        ctx: &ValidationContext,
        snapshot: &DeploymentSnapshot,
        render: &RenderContext,
    ) -> Result<PathBuf> {
        let path = self.path(ctx);
        let document = samconfig::to_document(&samconfig::render(snapshot, render));
        write_file(&path, &document)?;
        info!("Configuration saved to '{}'", path.display());
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ShellError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| ShellError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlantis_core::{Deployment, InfraType};
    use tempfile::TempDir;

    fn ctx() -> ValidationContext {
        ValidationContext::from_invocation(InfraType::Network, "acme", Some("widget"), Some("test"))
            .unwrap()
    }

    #[test]
    fn test_path() {
        let store = SamconfigStore::new("/work/samconfigs");
        assert_eq!(
            store.path(&ctx()),
            PathBuf::from("/work/samconfigs/acme/widget/samconfig-acme-widget-network.toml")
        );
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        let store = SamconfigStore::new(temp.path());
        assert_eq!(store.load(&ctx()).unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = SamconfigStore::new(temp.path());

        let mut snapshot = DeploymentSnapshot::default();
        snapshot
            .atlantis
            .insert("region".to_string(), "us-east-1".to_string());
        let mut deployment = Deployment::default();
        deployment
            .parameter_overrides
            .insert("Prefix".to_string(), "acme".to_string());
        snapshot.deployments.insert("test".to_string(), deployment);

        let path = store
            .save(&ctx(), &snapshot, &RenderContext::new(&ctx()))
            .unwrap();
        assert!(path.exists());
        assert_eq!(store.load(&ctx()).unwrap(), Some(snapshot));
    }

    #[test]
    fn test_load_unparseable() {
        let temp = TempDir::new().unwrap();
        let store = SamconfigStore::new(temp.path());
        let path = store.path(&ctx());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[broken").unwrap();
        assert!(store.load(&ctx()).is_err());
    }
}
