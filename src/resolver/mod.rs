//! Pluggable strategies that turn a URL or binary version metadata into license text.
//!
//! Resolvers are grouped into four ordered families held by [`ResolverRegistry`]:
//! license URLs, project URLs, repository URLs and version metadata. The
//! orchestrator asks each family in registration order; new strategies are added
//! by registering another implementation, never by touching the orchestrator.
//!
//! - [`dotnet_framework`] — embedded .NET library license for a well-known redirect
//!   link and for binaries shipped with the .NET Framework.
//! - [`opensource_org`] — `opensource.org/licenses/<id>` looked up through the
//!   GitHub licenses API.
//! - [`github`] — GitHub repositories and `blob` links.

pub mod dotnet_framework;
pub mod github;
pub mod opensource_org;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::models::{ResolverOptions, VersionInfo};

/// Resolver keyed by a URL taken from package metadata.
///
/// `resolve` returns `Ok(None)` when the target has no usable license
/// (missing resource, unexpected payload); `Err` is reserved for transport failures.
#[async_trait]
pub trait UriLicenseResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_resolve(&self, uri: &Url, options: &ResolverOptions) -> bool;

    async fn resolve(&self, uri: &Url, options: &ResolverOptions) -> Result<Option<String>>;
}

/// Resolver keyed by the version resource of a compiled binary.
#[async_trait]
pub trait VersionInfoLicenseResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_resolve(&self, info: &VersionInfo) -> bool;

    async fn resolve(&self, info: &VersionInfo, options: &ResolverOptions)
        -> Result<Option<String>>;
}

/// Which URL of the package metadata a resolver family handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriFamily {
    License,
    Project,
    Repository,
}

impl fmt::Display for UriFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriFamily::License => write!(f, "license url"),
            UriFamily::Project => write!(f, "project url"),
            UriFamily::Repository => write!(f, "repository url"),
        }
    }
}

/// Priority-ordered resolver families.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    license_url: Vec<Arc<dyn UriLicenseResolver>>,
    project_url: Vec<Arc<dyn UriLicenseResolver>>,
    repository_url: Vec<Arc<dyn UriLicenseResolver>>,
    version_info: Vec<Arc<dyn VersionInfoLicenseResolver>>,
}

impl ResolverRegistry {
    /// An empty registry; every URL step falls back to plain HTTP sniffing.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in resolvers, talking to the public GitHub endpoints.
    pub fn with_defaults(client: Client) -> Result<Self> {
        let endpoints = github::GithubEndpoints::public()?;
        Ok(Self::with_endpoints(client, endpoints))
    }

    pub fn with_endpoints(client: Client, endpoints: github::GithubEndpoints) -> Self {
        let framework = Arc::new(dotnet_framework::DotNetFrameworkResolver);
        let repository = Arc::new(github::GithubRepositoryResolver::new(
            client.clone(),
            endpoints.api.clone(),
        ));

        Self::new()
            .with_license_url(framework.clone())
            .with_license_url(Arc::new(opensource_org::OpenSourceOrgResolver::new(
                client.clone(),
                endpoints.api,
            )))
            .with_license_url(Arc::new(github::GithubBlobResolver::new(
                client,
                endpoints.raw,
            )))
            .with_project_url(repository.clone())
            .with_repository_url(repository)
            .with_version_info(framework)
    }

    pub fn with_license_url(mut self, resolver: Arc<dyn UriLicenseResolver>) -> Self {
        self.license_url.push(resolver);
        self
    }

    pub fn with_project_url(mut self, resolver: Arc<dyn UriLicenseResolver>) -> Self {
        self.project_url.push(resolver);
        self
    }

    pub fn with_repository_url(mut self, resolver: Arc<dyn UriLicenseResolver>) -> Self {
        self.repository_url.push(resolver);
        self
    }

    pub fn with_version_info(mut self, resolver: Arc<dyn VersionInfoLicenseResolver>) -> Self {
        self.version_info.push(resolver);
        self
    }

    pub fn uri_family(&self, family: UriFamily) -> &[Arc<dyn UriLicenseResolver>] {
        match family {
            UriFamily::License => &self.license_url,
            UriFamily::Project => &self.project_url,
            UriFamily::Repository => &self.repository_url,
        }
    }

    pub fn version_info(&self) -> &[Arc<dyn VersionInfoLicenseResolver>] {
        &self.version_info
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |resolvers: &[Arc<dyn UriLicenseResolver>]| {
            resolvers.iter().map(|r| r.name()).collect::<Vec<_>>()
        };
        f.debug_struct("ResolverRegistry")
            .field("license_url", &names(&self.license_url))
            .field("project_url", &names(&self.project_url))
            .field("repository_url", &names(&self.repository_url))
            .field(
                "version_info",
                &self.version_info.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_families_are_ordered() {
        let registry = ResolverRegistry::with_defaults(Client::new()).unwrap();
        let license: Vec<_> = registry
            .uri_family(UriFamily::License)
            .iter()
            .map(|r| r.name())
            .collect();
        assert_eq!(license, ["dotnet-framework", "opensource-org", "github-blob"]);
        assert_eq!(registry.uri_family(UriFamily::Project).len(), 1);
        assert_eq!(registry.uri_family(UriFamily::Repository).len(), 1);
        assert_eq!(registry.version_info().len(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ResolverRegistry::new();
        assert!(registry.uri_family(UriFamily::License).is_empty());
        assert!(registry.version_info().is_empty());
    }
}
