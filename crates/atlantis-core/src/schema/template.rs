//! Template identity and parameter-block extraction.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version reported when a template carries no `# Version:` line.
pub const NO_VERSION: &str = "No version found";

/// Identity of the template a deployment was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Template file name or `s3://` location
    pub file: String,

    /// Value of the first `# Version:` comment line
    pub version: String,

    /// SHA-256 hex digest of the raw template bytes
    pub hash: String,

    /// Last 6 hex characters of `hash`
    pub hash_id: String,
}

impl TemplateInfo {
    pub fn from_bytes(file: impl Into<String>, content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let hash = hex::encode(hasher.finalize());
        let hash_id = hash[hash.len() - 6..].to_string();

        let version = String::from_utf8_lossy(content)
            .lines()
            .find_map(|line| line.strip_prefix("# Version:"))
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| NO_VERSION.to_string());

        Self {
            file: file.into(),
            version,
            hash,
            hash_id,
        }
    }
}

/// Slice the top-level `Parameters:` block out of a template.
///
/// Templates use intrinsic-function tags (`!Ref`, `!Sub`) elsewhere, so
/// only this block is handed to the YAML parser. The block ends at the
/// next unindented `Key:` line.
pub fn extract_parameters_section(text: &str) -> Option<String> {
    let mut lines = text.lines().skip_while(|line| !line.starts_with("Parameters:"));
    let first = lines.next()?;

    let mut section = first.to_string();
    for line in lines {
        let trimmed = line.trim();
        if !trimmed.is_empty()
            && !line.starts_with(' ')
            && !line.starts_with('#')
            && trimmed.ends_with(':')
        {
            break;
        }
        section.push('\n');
        section.push_str(line);
    }
    Some(section)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_info() {
        let info = TemplateInfo::from_bytes("t.yml", b"# Version: v1.0.0/2024-01-01\nParameters:\n");
        assert_eq!(info.version, "v1.0.0/2024-01-01");
        assert_eq!(info.hash.len(), 64);
        assert_eq!(info.hash_id, &info.hash[58..]);
    }

    #[test]
    fn test_template_info_without_version() {
        let info = TemplateInfo::from_bytes("t.yml", b"Resources: {}\n");
        assert_eq!(info.version, NO_VERSION);
    }

    #[test]
    fn test_hash_of_empty_input() {
        let info = TemplateInfo::from_bytes("empty.yml", b"");
        assert_eq!(
            info.hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(info.hash_id, "52b855");
    }

    #[test]
    fn test_extract_stops_at_next_section() {
        let text = "Description: x\nParameters:\n  A:\n    Type: String\n\n  B:\n    Type: Number\nConditions:\n  IsProd: !Equals [a, b]\n";
        let section = extract_parameters_section(text).unwrap();
        assert!(section.contains("A:"));
        assert!(section.contains("B:"));
        assert!(!section.contains("Conditions"));
        assert!(!section.contains("!Equals"));
    }

    #[test]
    fn test_extract_missing() {
        assert!(extract_parameters_section("Resources:\n  A: {}\n").is_none());
    }
}
