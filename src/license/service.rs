//! Resolution orchestrator: tries every license source of a dependency in a
//! fixed priority order and memoizes the first hit.

use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::cache::LicenseCache;
use super::normalize::normalize;
use crate::fetch::UrlFetcher;
use crate::models::{DependencyRecord, ResolverOptions};
use crate::resolver::{ResolverRegistry, UriFamily};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("license resolution cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlMode {
    /// Hand the URL to the resolvers as written.
    Direct,
    /// Fetch the URL and work with wherever the redirects end.
    Final,
}

/// One license source of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    LicenseRelativePath,
    Url(UriFamily, UrlMode),
    PackagePath,
    SourcePath,
    VersionInfo,
}

/// Sources in priority order; the first one producing text wins.
const PIPELINE: [Step; 10] = [
    Step::LicenseRelativePath,
    Step::Url(UriFamily::License, UrlMode::Direct),
    Step::Url(UriFamily::Repository, UrlMode::Direct),
    Step::Url(UriFamily::Project, UrlMode::Direct),
    Step::PackagePath,
    Step::SourcePath,
    Step::VersionInfo,
    Step::Url(UriFamily::License, UrlMode::Final),
    Step::Url(UriFamily::Repository, UrlMode::Final),
    Step::Url(UriFamily::Project, UrlMode::Final),
];

/// Resolves the license text of dependencies.
///
/// Shared across concurrent resolutions; every successful lookup is cached
/// under the package id and the URL or path it came from.
#[derive(Debug)]
pub struct LicenseService {
    registry: ResolverRegistry,
    fetcher: UrlFetcher,
    cache: Arc<LicenseCache>,
}

impl LicenseService {
    pub fn new(registry: ResolverRegistry, fetcher: UrlFetcher, cache: Arc<LicenseCache>) -> Self {
        Self {
            registry,
            fetcher,
            cache,
        }
    }

    pub fn cache(&self) -> &LicenseCache {
        &self.cache
    }

    /// Normalized license text of `dep`, or `None` when no source yields any.
    ///
    /// Failures of individual sources are logged and skipped. The only error is
    /// cancellation, checked before and during every source; a cancelled source
    /// leaves the cache untouched.
    pub async fn resolve_license(
        &self,
        dep: &DependencyRecord,
        options: &ResolverOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<str>>, ResolveError> {
        if let Some(hit) = dep.package_id().and_then(|id| self.cache.get(id)) {
            return Ok(Some(hit));
        }

        for step in PIPELINE {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            let found = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                found = self.run_step(step, dep, options) => found,
            };
            if let Some(license) = found {
                tracing::debug!(dependency = %dep.display_name(), ?step, "license resolved");
                return Ok(Some(license));
            }
        }

        tracing::debug!(dependency = %dep.display_name(), "no license found");
        Ok(None)
    }

    async fn run_step(
        &self,
        step: Step,
        dep: &DependencyRecord,
        options: &ResolverOptions,
    ) -> Option<Arc<str>> {
        match step {
            Step::LicenseRelativePath => self.from_license_relative_path(dep).await,
            Step::Url(family, mode) => self.from_url(dep, family, mode, options).await,
            Step::PackagePath => self.from_package_path(dep).await,
            Step::SourcePath => self.from_source_path(dep).await,
            Step::VersionInfo => self.from_version_info(dep, options).await,
        }
    }

    async fn from_license_relative_path(&self, dep: &DependencyRecord) -> Option<Arc<str>> {
        let package_path = non_empty_path(dep.package_path.as_deref())?;
        let relative = dep
            .package
            .as_ref()?
            .license_relative_path
            .as_deref()
            .filter(|p| !p.is_empty())?;
        // nuspec paths use Windows separators
        let full = package_path.join(relative.replace('\\', "/"));
        let key = full.to_string_lossy().into_owned();

        if let Some(hit) = self.cache.get(&key) {
            return Some(self.alias(dep, hit));
        }
        if !has_license_extension(&full) {
            return None;
        }

        let text = contain(read_license_file(&full).await, &key)?;
        Some(self.remember(dep, key, text))
    }

    async fn from_url(
        &self,
        dep: &DependencyRecord,
        family: UriFamily,
        mode: UrlMode,
        options: &ResolverOptions,
    ) -> Option<Arc<str>> {
        let package = dep.package.as_ref()?;
        let raw = match family {
            UriFamily::License => package.license_url.as_deref(),
            UriFamily::Project => package.project_url.as_deref(),
            UriFamily::Repository => package.repository_url.as_deref(),
        }
        .filter(|u| !u.is_empty())?;

        if let Some(hit) = self.cache.get(raw) {
            return Some(self.alias(dep, hit));
        }
        let uri = match Url::parse(raw) {
            Ok(uri) => uri,
            Err(err) => {
                tracing::debug!(url = raw, %family, error = %err, "skipping malformed url");
                return None;
            }
        };

        let resolvers = self.registry.uri_family(family);
        let result = match mode {
            UrlMode::Direct => self.fetcher.resolve_direct(&uri, resolvers, options).await,
            UrlMode::Final => self.fetcher.resolve_final(&uri, resolvers, options).await,
        };
        let text = contain(result, raw)?;
        Some(self.remember(dep, raw.to_string(), text))
    }

    async fn from_package_path(&self, dep: &DependencyRecord) -> Option<Arc<str>> {
        let dir = non_empty_path(dep.package_path.as_deref())?;
        let key = dir.to_string_lossy().into_owned();
        if let Some(hit) = self.cache.get(&key) {
            return Some(self.alias(dep, hit));
        }

        let text = contain(scan_package_dir(dir).await, &key)?;
        Some(self.remember(dep, key, text))
    }

    async fn from_source_path(&self, dep: &DependencyRecord) -> Option<Arc<str>> {
        let source = non_empty_path(dep.source_path.as_deref())?;
        let key = source.to_string_lossy().into_owned();
        if let Some(hit) = self.cache.get(&key) {
            return Some(self.alias(dep, hit));
        }

        let text = contain(scan_source_dir(source).await, &key)?;
        Some(self.remember(dep, key, text))
    }

    async fn from_version_info(
        &self,
        dep: &DependencyRecord,
        options: &ResolverOptions,
    ) -> Option<Arc<str>> {
        let info = dep.version_info.as_ref()?;
        if let Some(hit) = self.cache.get(&info.file_name) {
            return Some(self.alias(dep, hit));
        }

        for resolver in self.registry.version_info() {
            if !resolver.can_resolve(info) {
                continue;
            }
            let result = resolver.resolve(info, options).await;
            let text = contain(result, &info.file_name)
                .as_deref()
                .and_then(normalize);
            if let Some(text) = text {
                return Some(self.remember(dep, info.file_name.clone(), text));
            }
        }
        None
    }

    /// A hit found under a URL or path key also becomes the package's entry.
    fn alias(&self, dep: &DependencyRecord, hit: Arc<str>) -> Arc<str> {
        self.cache.insert_all(dep.package_id(), &hit);
        hit
    }

    /// Cache `text` under the package id and `key`, returning the shared value.
    fn remember(&self, dep: &DependencyRecord, key: String, text: String) -> Arc<str> {
        let license: Arc<str> = Arc::from(text);
        let keys = dep
            .package_id()
            .map(str::to_string)
            .into_iter()
            .chain(std::iter::once(key));
        self.cache.insert_all(keys, &license);
        license
    }
}

/// Turn a failed lookup into absence, keeping the failure in the debug log.
fn contain<T, E>(result: Result<Option<T>, E>, subject: &str) -> Option<T>
where
    E: Display,
{
    match result {
        Ok(found) => found,
        Err(err) => {
            tracing::debug!(subject, error = %err, "unable to resolve license");
            None
        }
    }
}

fn non_empty_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

fn has_license_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
}

/// `license.txt` or `license.md` at the top level of a package directory.
async fn scan_package_dir(dir: &Path) -> Result<Option<String>> {
    let pattern = Regex::new(r"(?i)^license\.(txt|md)$")?;
    match find_license_file(dir, &pattern).await? {
        Some(path) => read_license_file(&path).await,
        None => Ok(None),
    }
}

/// License file next to `source`, either generic or named after the source file.
async fn scan_source_dir(source: &Path) -> Result<Option<String>> {
    let dir = match source.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => return Ok(None),
    };
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let pattern = source_license_pattern(&stem)?;
    match find_license_file(dir, &pattern).await? {
        Some(path) => read_license_file(&path).await,
        None => Ok(None),
    }
}

/// `license.txt` / `license.md`, optionally prefixed by `<stem>` and one of `-`, `_`, `+`.
fn source_license_pattern(stem: &str) -> Result<Regex> {
    let pattern = format!(
        r"(?i)^(?:{}[-_+])?license\.(?:txt|md)$",
        regex::escape(stem)
    );
    Ok(Regex::new(&pattern)?)
}

/// First regular file directly inside `dir` whose name matches `pattern`.
/// Candidates are taken in file-name order so results do not depend on the filesystem.
async fn find_license_file(dir: &Path, pattern: &Regex) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("listing {}", dir.display()))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !pattern.is_match(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Read and normalize a license file; a missing file is absence, not an error.
async fn read_license_file(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(normalize(&String::from_utf8_lossy(&bytes))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
    }
}
