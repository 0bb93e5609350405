use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::github::api_request;
use super::UriLicenseResolver;
use crate::models::ResolverOptions;

const OPENSOURCE_ORG_HOST: &str = "opensource.org";

/// Resolves `https://opensource.org/licenses/<id>` links.
///
/// opensource.org serves HTML, so the license id is looked up through the
/// GitHub licenses API (`GET /licenses/{id}`), whose `body` field holds the
/// plain license text.
#[derive(Debug, Clone)]
pub struct OpenSourceOrgResolver {
    client: Client,
    api: Url,
}

impl OpenSourceOrgResolver {
    pub fn new(client: Client, api: Url) -> Self {
        Self { client, api }
    }
}

/// License id from the URL path: `/licenses/MIT`, `/licenses/mit-license.php`
/// and `/licenses/Apache-2.0/` all name a license.
fn license_id(uri: &Url) -> Option<String> {
    let mut segments = uri.path_segments()?.filter(|s| !s.is_empty());
    if segments.next()? != "licenses" {
        return None;
    }
    let raw = segments.next()?;
    let id = raw
        .trim_end_matches(".php")
        .trim_end_matches(".html")
        .trim_end_matches("-license");
    if id.is_empty() {
        return None;
    }
    Some(id.to_ascii_lowercase())
}

#[async_trait]
impl UriLicenseResolver for OpenSourceOrgResolver {
    fn name(&self) -> &'static str {
        "opensource-org"
    }

    fn can_resolve(&self, uri: &Url, _options: &ResolverOptions) -> bool {
        uri.host_str() == Some(OPENSOURCE_ORG_HOST)
    }

    async fn resolve(&self, uri: &Url, options: &ResolverOptions) -> Result<Option<String>> {
        let Some(id) = license_id(uri) else {
            return Ok(None);
        };
        let endpoint = self.api.join(&format!("licenses/{id}"))?;

        let response = api_request(&self.client, endpoint, options).send().await?;
        if !response.status().is_success() {
            tracing::debug!(%uri, license = %id, status = %response.status(), "license not known to registry");
            return Ok(None);
        }

        let data: serde_json::Value = match response.json().await {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(%uri, error = %err, "malformed registry response");
                return Ok(None);
            }
        };
        let body = data
            .get("body")
            .and_then(|b| b.as_str())
            .map(str::to_string);

        Ok(body)
    }
}
