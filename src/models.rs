use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default `User-Agent` sent with every outgoing request.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "license-notices/",
    env!("CARGO_PKG_VERSION"),
    " (third-party notices generator)"
);

/// Scalar fields extracted from a package manifest (`.nuspec`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    /// Path of the license file relative to the package directory.
    #[serde(default)]
    pub license_relative_path: Option<String>,
}

/// Version resource of a compiled binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub file_description: Option<String>,
    #[serde(default)]
    pub product_version: Option<String>,
}

/// Everything known about one dependency whose license text must be found.
///
/// Every field is optional; the resolver uses whatever subset is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRecord {
    #[serde(default)]
    pub package: Option<PackageMetadata>,
    /// Extracted package directory on disk.
    #[serde(default)]
    pub package_path: Option<PathBuf>,
    /// A file shipped by the dependency (usually the binary itself).
    #[serde(default)]
    pub source_path: Option<PathBuf>,
    #[serde(default)]
    pub version_info: Option<VersionInfo>,
}

impl DependencyRecord {
    /// Package id, if the record carries non-empty package metadata.
    pub fn package_id(&self) -> Option<&str> {
        self.package
            .as_ref()
            .map(|p| p.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Human-readable name used in reports and log lines.
    pub fn display_name(&self) -> String {
        if let Some(id) = self.package_id() {
            return id.to_string();
        }
        if let Some(info) = &self.version_info {
            return info.file_name.clone();
        }
        if let Some(path) = self.source_path.as_ref().or(self.package_path.as_ref()) {
            return path.display().to_string();
        }
        "<unnamed>".to_string()
    }

    pub fn version(&self) -> Option<&str> {
        self.package
            .as_ref()
            .and_then(|p| p.version.as_deref())
            .or_else(|| {
                self.version_info
                    .as_ref()
                    .and_then(|v| v.product_version.as_deref())
            })
    }
}

/// Settings shared by every resolver call during one run.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Upper bound for each HTTP request.
    pub timeout: Duration,
    /// Whether the final-URL strategy follows HTTP redirects.
    pub follow_redirects: bool,
    /// Bearer credential for the GitHub API.
    pub github_token: Option<String>,
    pub user_agent: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        ResolverOptions {
            timeout: Duration::from_secs(10),
            follow_redirects: true,
            github_token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// One row of the final report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLicense {
    pub name: String,
    pub version: Option<String>,
    pub project_url: Option<String>,
    pub license: Option<String>,
}

impl ResolvedLicense {
    pub fn new(record: &DependencyRecord, license: Option<&str>) -> Self {
        ResolvedLicense {
            name: record.display_name(),
            version: record.version().map(str::to_string),
            project_url: record
                .package
                .as_ref()
                .and_then(|p| p.project_url.clone().or_else(|| p.repository_url.clone())),
            license: license.map(str::to_string),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.license.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_ignores_empty() {
        let record = DependencyRecord {
            package: Some(PackageMetadata::default()),
            ..Default::default()
        };
        assert_eq!(record.package_id(), None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let record = DependencyRecord {
            version_info: Some(VersionInfo {
                file_name: "native.dll".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(record.display_name(), "native.dll");
        assert_eq!(DependencyRecord::default().display_name(), "<unnamed>");
    }

    #[test]
    fn test_deserialize_partial_record() {
        let json = r#"{"package": {"id": "Serilog", "projectUrl": "https://serilog.net"}}"#;
        let record: DependencyRecord = serde_json::from_str(json).unwrap();
        let package = record.package.unwrap();
        assert_eq!(package.id, "Serilog");
        assert_eq!(package.project_url.as_deref(), Some("https://serilog.net"));
        assert!(package.license_url.is_none());
        assert!(record.package_path.is_none());
    }

    #[test]
    fn test_deserialize_record_without_id() {
        let json = r#"[{"package": {"repositoryUrl": "https://github.com/x/y"}}]"#;
        let records: Vec<DependencyRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].package_id(), None);
        assert_eq!(
            records[0].package.as_ref().unwrap().repository_url.as_deref(),
            Some("https://github.com/x/y")
        );
    }
}
