//! Template discovery and reading.

use std::fs;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};
use walkdir::WalkDir;

use atlantis_core::{ConfigError, ParameterSchema, TemplateInfo};

use crate::error::{Result, ShellError};

fn template_globs() -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in ["*.yml", "*.yaml"] {
        let glob = Glob::new(pattern)
            .map_err(|e| ShellError::Config(ConfigError::fatal(e.to_string())))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ShellError::Config(ConfigError::fatal(e.to_string())))
}

/// Template file names directly inside `dir`, sorted.
///
/// A missing directory has no templates.
pub fn discover(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        debug!("Template directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let globs = template_globs()?;
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ShellError::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if globs.is_match(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// A template read from disk with its identity and parameter schema.
#[derive(Debug, Clone)]
pub struct LoadedTemplate {
    pub info: TemplateInfo,
    pub schema: ParameterSchema,
}

/// Read `file` from `dir`. Only local templates are supported.
pub fn load(dir: &Path, file: &str) -> Result<LoadedTemplate> {
    if file.starts_with("s3://") {
        return Err(ConfigError::fatal(format!("remote templates not supported: {}", file)).into());
    }

    let path = dir.join(file);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ShellError::TemplateNotFound(path.display().to_string()))
        }
        Err(e) => return Err(ShellError::io(&path, e)),
    };

    let info = TemplateInfo::from_bytes(file, &bytes);
    let text = String::from_utf8(bytes).map_err(|e| ShellError::parse(&path, e.to_string()))?;
    let schema = ParameterSchema::from_template(&text)?;

    info!(
        "Using template {} (version {}, {} parameters)",
        file,
        info.version,
        schema.len()
    );
    Ok(LoadedTemplate { info, schema })
}

/// Pick the template to use: the requested one, else the one recorded in
/// the existing samconfig, else the only template available.
pub fn select(dir: &Path, requested: Option<&str>, recorded: Option<String>) -> Result<String> {
    if let Some(file) = requested {
        return Ok(file.to_string());
    }
    if let Some(file) = recorded {
        debug!("Using template recorded in samconfig: {}", file);
        return Ok(file);
    }

    let mut available = discover(dir)?;
    match available.len() {
        1 => Ok(available.remove(0)),
        0 => Err(ShellError::TemplateNotFound(format!(
            "no templates in {}",
            dir.display()
        ))),
        _ => Err(ConfigError::fatal(format!(
            "several templates available, choose one with --template: {}",
            available.join(", ")
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = "\
AWSTemplateFormatVersion: '2010-09-09'
# Version: v2.1.0
Description: test

Parameters:
  Prefix:
    Type: String
    AllowedPattern: '^[a-z]+$'
  Memory:
    Type: Number
    MinValue: 128
    Default: 256

Resources:
  Bucket:
    Type: AWS::S3::Bucket
";

    #[test]
    fn test_discover_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.yaml"), "").unwrap();
        fs::write(temp.path().join("a.yml"), "").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/c.yml"), "").unwrap();

        assert_eq!(discover(temp.path()).unwrap(), vec!["a.yml", "b.yaml"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(discover(&temp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_load_template() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("template.yml"), TEMPLATE).unwrap();

        let loaded = load(temp.path(), "template.yml").unwrap();
        assert_eq!(loaded.info.version, "v2.1.0");
        assert_eq!(loaded.info.hash_id.len(), 6);
        let names: Vec<&str> = loaded.schema.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Prefix", "Memory"]);
    }

    #[test]
    fn test_load_rejects_s3() {
        let temp = TempDir::new().unwrap();
        let err = load(temp.path(), "s3://bucket/template.yml").unwrap_err();
        assert!(err.to_string().contains("remote templates not supported"));
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            load(temp.path(), "nope.yml"),
            Err(ShellError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_select() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("only.yml"), "").unwrap();

        assert_eq!(select(temp.path(), Some("x.yml"), None).unwrap(), "x.yml");
        assert_eq!(
            select(temp.path(), None, Some("recorded.yml".to_string())).unwrap(),
            "recorded.yml"
        );
        assert_eq!(select(temp.path(), None, None).unwrap(), "only.yml");

        fs::write(temp.path().join("other.yml"), "").unwrap();
        assert!(select(temp.path(), None, None).is_err());
    }
}
