//! URL fetch strategy: resolve a metadata URL directly through the registered
//! resolvers, or fetch it over HTTP and retry against wherever the redirects led.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use thiserror::Error;
use url::Url;

use crate::license::normalize::normalize;
use crate::models::ResolverOptions;
use crate::resolver::UriLicenseResolver;

/// Redirect hops followed before giving up on a URL.
const MAX_REDIRECTS: usize = 10;

/// Transient failures while fetching a URL. All of them mean "nothing found here"
/// to the caller once logged.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("resolver {resolver} failed for {url}: {source}")]
    Resolver {
        resolver: &'static str,
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Performs the two URL resolution modes against one resolver family.
#[derive(Debug, Clone)]
pub struct UrlFetcher {
    client: Client,
}

impl UrlFetcher {
    /// Build the client used for final-URL lookups. Redirects are followed only
    /// when `options.follow_redirects` is set.
    pub fn new(options: &ResolverOptions) -> Result<Self, FetchError> {
        let policy = if options.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };
        let client = Client::builder()
            .timeout(options.timeout)
            .redirect(policy)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Ask each resolver that recognizes `uri`, in order, until one yields text.
    /// Performs no HTTP request of its own.
    pub async fn resolve_direct(
        &self,
        uri: &Url,
        resolvers: &[Arc<dyn UriLicenseResolver>],
        options: &ResolverOptions,
    ) -> Result<Option<String>, FetchError> {
        for resolver in resolvers {
            if !resolver.can_resolve(uri, options) {
                continue;
            }
            let text = resolver
                .resolve(uri, options)
                .await
                .map_err(|source| FetchError::Resolver {
                    resolver: resolver.name(),
                    url: uri.to_string(),
                    source,
                })?;
            if let Some(license) = text.as_deref().and_then(normalize) {
                tracing::trace!(%uri, resolver = resolver.name(), "resolver produced license");
                return Ok(Some(license));
            }
        }
        Ok(None)
    }

    /// GET `uri`; if it redirected, resolve the final URL directly; otherwise
    /// accept the body when it is served as `text/plain`.
    ///
    /// A failed `*.txt` URL is retried once without the extension.
    pub async fn resolve_final(
        &self,
        uri: &Url,
        resolvers: &[Arc<dyn UriLicenseResolver>],
        options: &ResolverOptions,
    ) -> Result<Option<String>, FetchError> {
        let mut response = self.get(uri, options).await?;

        if !response.status().is_success() && uri.path().ends_with(".txt") {
            let mut bare = uri.clone();
            let path = uri.path();
            bare.set_path(&path[..path.len() - ".txt".len()]);
            tracing::debug!(%uri, status = %response.status(), retry = %bare, "retrying without .txt");

            response = self.get(&bare, options).await?;
            if !response.status().is_success() {
                return Ok(None);
            }
        }

        let final_uri = response.url().clone();
        if &final_uri != uri {
            tracing::debug!(%uri, %final_uri, "resolving redirect target");
            if let Some(license) = self.resolve_direct(&final_uri, resolvers, options).await? {
                return Ok(Some(license));
            }
        }

        if !response.status().is_success() {
            return Ok(None);
        }
        if media_type(&response) != Some("text/plain") {
            tracing::trace!(url = %final_uri, media_type = ?media_type(&response), "not plain text");
            return Ok(None);
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: final_uri.to_string(),
            source,
        })?;
        Ok(normalize(&body))
    }

    async fn get(&self, uri: &Url, options: &ResolverOptions) -> Result<Response, FetchError> {
        self.client
            .get(uri.clone())
            .header(USER_AGENT, &options.user_agent)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: uri.to_string(),
                source,
            })
    }
}

/// Declared media type without parameters (`text/plain; charset=utf-8` -> `text/plain`).
fn media_type(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(CONTENT_TYPE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::trim)
}
