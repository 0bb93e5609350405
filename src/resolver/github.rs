use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use url::Url;

use super::UriLicenseResolver;
use crate::models::ResolverOptions;

const GITHUB_API: &str = "https://api.github.com/";
const GITHUB_RAW: &str = "https://raw.githubusercontent.com/";

/// Base addresses of the GitHub services the resolvers talk to.
#[derive(Debug, Clone)]
pub struct GithubEndpoints {
    pub api: Url,
    pub raw: Url,
}

impl GithubEndpoints {
    pub fn public() -> Result<Self> {
        Ok(GithubEndpoints {
            api: Url::parse(GITHUB_API)?,
            raw: Url::parse(GITHUB_RAW)?,
        })
    }
}

/// GET against the GitHub REST API with the headers it requires.
///
/// GitHub rejects requests without a `User-Agent`; the bearer token is optional
/// and only raises the rate limit.
pub(crate) fn api_request(client: &Client, url: Url, options: &ResolverOptions) -> RequestBuilder {
    let request = client
        .get(url)
        .timeout(options.timeout)
        .header(USER_AGENT, &options.user_agent)
        .header(ACCEPT, "application/vnd.github+json");
    match options.github_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

fn is_github_host(uri: &Url) -> bool {
    matches!(uri.host_str(), Some("github.com" | "www.github.com"))
}

fn path_segments(uri: &Url) -> Vec<&str> {
    uri.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// `(owner, repo)` of a `github.com/<owner>/<repo>` URL.
fn repository_slug(uri: &Url) -> Option<(&str, &str)> {
    if !is_github_host(uri) {
        return None;
    }
    let segments = path_segments(uri);
    let owner = *segments.first()?;
    let repo = (*segments.get(1)?).trim_end_matches(".git");
    if repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

/// Payload of `GET /repos/{owner}/{repo}/license`.
#[derive(Debug, Deserialize)]
struct RepositoryLicense {
    content: String,
    encoding: String,
}

/// Looks up the license GitHub detected for a repository.
#[derive(Debug, Clone)]
pub struct GithubRepositoryResolver {
    client: Client,
    api: Url,
}

impl GithubRepositoryResolver {
    pub fn new(client: Client, api: Url) -> Self {
        Self { client, api }
    }
}

#[async_trait]
impl UriLicenseResolver for GithubRepositoryResolver {
    fn name(&self) -> &'static str {
        "github-repository"
    }

    fn can_resolve(&self, uri: &Url, _options: &ResolverOptions) -> bool {
        repository_slug(uri).is_some()
    }

    async fn resolve(&self, uri: &Url, options: &ResolverOptions) -> Result<Option<String>> {
        let Some((owner, repo)) = repository_slug(uri) else {
            return Ok(None);
        };
        let endpoint = self.api.join(&format!("repos/{owner}/{repo}/license"))?;

        let response = api_request(&self.client, endpoint, options).send().await?;
        if !response.status().is_success() {
            tracing::debug!(%uri, status = %response.status(), "github has no license for repository");
            return Ok(None);
        }

        let payload: RepositoryLicense = match response.json().await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(%uri, error = %err, "unexpected github license payload");
                return Ok(None);
            }
        };
        Ok(decode_content(&payload))
    }
}

fn decode_content(payload: &RepositoryLicense) -> Option<String> {
    if payload.encoding != "base64" {
        return None;
    }
    // GitHub wraps the encoded content at 60 columns.
    let compact: String = payload
        .content
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// Fetches `github.com/<owner>/<repo>/blob/<ref>/<path>` links from the raw content host.
#[derive(Debug, Clone)]
pub struct GithubBlobResolver {
    client: Client,
    raw: Url,
}

impl GithubBlobResolver {
    pub fn new(client: Client, raw: Url) -> Self {
        Self { client, raw }
    }

    fn raw_url(&self, uri: &Url) -> Option<Url> {
        if !is_github_host(uri) {
            return None;
        }
        let segments = path_segments(uri);
        if segments.len() < 5 || segments[2] != "blob" {
            return None;
        }
        let (owner, repo, reference) = (segments[0], segments[1], segments[3]);
        let file = segments[4..].join("/");
        self.raw
            .join(&format!("{owner}/{repo}/{reference}/{file}"))
            .ok()
    }
}

#[async_trait]
impl UriLicenseResolver for GithubBlobResolver {
    fn name(&self) -> &'static str {
        "github-blob"
    }

    fn can_resolve(&self, uri: &Url, _options: &ResolverOptions) -> bool {
        self.raw_url(uri).is_some()
    }

    async fn resolve(&self, uri: &Url, options: &ResolverOptions) -> Result<Option<String>> {
        let Some(raw) = self.raw_url(uri) else {
            return Ok(None);
        };
        let response = self
            .client
            .get(raw)
            .timeout(options.timeout)
            .header(USER_AGENT, &options.user_agent)
            .send()
            .await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options_with_token(token: Option<&str>) -> ResolverOptions {
        ResolverOptions {
            github_token: token.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_repository_slug() {
        let uri = Url::parse("https://github.com/JamesNK/Newtonsoft.Json.git").unwrap();
        assert_eq!(repository_slug(&uri), Some(("JamesNK", "Newtonsoft.Json")));

        let uri = Url::parse("https://github.com/serilog/serilog/tree/dev").unwrap();
        assert_eq!(repository_slug(&uri), Some(("serilog", "serilog")));

        let owner_only = Url::parse("https://github.com/serilog").unwrap();
        assert_eq!(repository_slug(&owner_only), None);

        let elsewhere = Url::parse("https://gitlab.com/group/project").unwrap();
        assert_eq!(repository_slug(&elsewhere), None);
    }

    #[test]
    fn test_blob_rewritten_to_raw_host() {
        let resolver = GithubBlobResolver::new(Client::new(), Url::parse(GITHUB_RAW).unwrap());
        let uri =
            Url::parse("https://github.com/dotnet/runtime/blob/main/LICENSE.TXT").unwrap();
        assert_eq!(
            resolver.raw_url(&uri).unwrap().as_str(),
            "https://raw.githubusercontent.com/dotnet/runtime/main/LICENSE.TXT"
        );

        let not_blob = Url::parse("https://github.com/dotnet/runtime").unwrap();
        assert!(resolver.raw_url(&not_blob).is_none());
    }

    #[tokio::test]
    async fn test_repository_license_decoded() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode("MIT License\n\nCopyright (c) Serilog");
        let wrapped = format!("{}\n{}", &encoded[..12], &encoded[12..]);

        Mock::given(method("GET"))
            .and(path("/repos/serilog/serilog/license"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "LICENSE",
                "content": wrapped,
                "encoding": "base64",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resolver =
            GithubRepositoryResolver::new(Client::new(), Url::parse(&server.uri()).unwrap());
        let uri = Url::parse("https://github.com/serilog/serilog").unwrap();
        let text = resolver
            .resolve(&uri, &options_with_token(Some("secret")))
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("MIT License\n\nCopyright (c) Serilog"));
    }

    #[tokio::test]
    async fn test_repository_without_license() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver =
            GithubRepositoryResolver::new(Client::new(), Url::parse(&server.uri()).unwrap());
        let uri = Url::parse("https://github.com/acme/widgets").unwrap();
        let text = resolver.resolve(&uri, &options_with_token(None)).await.unwrap();
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn test_unexpected_payload_is_absence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "moved"
            })))
            .mount(&server)
            .await;

        let resolver =
            GithubRepositoryResolver::new(Client::new(), Url::parse(&server.uri()).unwrap());
        let uri = Url::parse("https://github.com/acme/widgets").unwrap();
        let text = resolver.resolve(&uri, &options_with_token(None)).await.unwrap();
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn test_blob_fetched_raw() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dotnet/runtime/main/LICENSE.TXT"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("The MIT License (MIT)", "text/plain"))
            .mount(&server)
            .await;

        let resolver = GithubBlobResolver::new(Client::new(), Url::parse(&server.uri()).unwrap());
        let uri =
            Url::parse("https://github.com/dotnet/runtime/blob/main/LICENSE.TXT").unwrap();
        let text = resolver
            .resolve(&uri, &ResolverOptions::default())
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("The MIT License (MIT)"));
    }
}
