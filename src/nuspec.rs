use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::models::{DependencyRecord, PackageMetadata};

#[derive(Debug, Error)]
pub enum NuspecError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed nuspec: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("nuspec has no <id>")]
    MissingId,
}

/// Metadata fields of a `.nuspec` document that matter for license lookup.
///
/// ```xml
/// <package><metadata>
///   <id>Serilog</id>
///   <version>2.12.0</version>
///   <license type="file">LICENSE.txt</license>
///   <licenseUrl>https://aka.ms/deprecateLicenseUrl</licenseUrl>
///   <projectUrl>https://serilog.net/</projectUrl>
///   <repository type="git" url="https://github.com/serilog/serilog" />
/// </metadata></package>
/// ```
pub fn parse_nuspec(xml: &str) -> Result<PackageMetadata, NuspecError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut metadata = PackageMetadata::default();
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut license_is_file = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = local_name(e);
                match tag.as_str() {
                    "license" => license_is_file = attribute(e, "type").as_deref() == Some("file"),
                    "repository" => metadata.repository_url = repository_url(e),
                    _ => {}
                }
                current = Some(tag);
            }
            Event::Empty(ref e) => {
                if local_name(e) == "repository" {
                    metadata.repository_url = repository_url(e);
                }
            }
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map(|t| t.trim().to_string())
                    .unwrap_or_default();
                if !text.is_empty() {
                    match current.as_deref() {
                        Some("id") => metadata.id = text,
                        Some("version") => metadata.version = Some(text),
                        Some("licenseUrl") => metadata.license_url = Some(text),
                        Some("projectUrl") => metadata.project_url = Some(text),
                        Some("license") if license_is_file => {
                            metadata.license_relative_path = Some(text)
                        }
                        _ => {}
                    }
                }
            }
            Event::End(_) => {
                license_is_file = false;
                current = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if metadata.id.is_empty() {
        return Err(NuspecError::MissingId);
    }
    Ok(metadata)
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned()
}

fn repository_url(e: &BytesStart) -> Option<String> {
    attribute(e, "url").filter(|u| !u.is_empty())
}

fn attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        (key == name).then(|| attr.unescape_value().unwrap_or_default().into_owned())
    })
}

/// Read the `.nuspec` of one extracted package directory.
pub fn read_package(dir: &Path) -> Result<Option<DependencyRecord>, NuspecError> {
    let entries = std::fs::read_dir(dir).map_err(|source| NuspecError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut nuspecs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("nuspec"))
        .collect();
    nuspecs.sort();

    let Some(nuspec) = nuspecs.into_iter().next() else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(&nuspec).map_err(|source| NuspecError::Io {
        path: nuspec.clone(),
        source,
    })?;
    let metadata = parse_nuspec(&content)?;

    Ok(Some(DependencyRecord {
        package: Some(metadata),
        package_path: Some(dir.to_path_buf()),
        ..Default::default()
    }))
}

/// Find extracted packages under `root`.
///
/// `root` is either a single package directory, or a NuGet packages folder laid
/// out as `<root>/<id>/<version>/<id>.nuspec`. Unreadable or malformed packages
/// are logged and skipped.
pub fn discover_packages(root: &Path) -> Result<Vec<DependencyRecord>, NuspecError> {
    if let Some(record) = read_package(root)? {
        return Ok(vec![record]);
    }

    let mut records = Vec::new();
    for id_dir in sorted_subdirs(root)? {
        let versions = match sorted_subdirs(&id_dir) {
            Ok(versions) => versions,
            Err(err) => {
                tracing::warn!(path = %id_dir.display(), error = %err, "skipping package folder");
                continue;
            }
        };
        for version_dir in versions {
            match read_package(&version_dir) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %version_dir.display(), error = %err, "skipping package");
                }
            }
        }
    }
    Ok(records)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, NuspecError> {
    let entries = std::fs::read_dir(dir).map_err(|source| NuspecError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}
