use std::sync::OnceLock;

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use super::{UriLicenseResolver, VersionInfoLicenseResolver};
use crate::models::{ResolverOptions, VersionInfo};

/// Query fragment of the fwlink Microsoft uses as license URL for .NET library packages.
const LICENSE_LINK_ID: &str = "LinkId=529443";

/// Product name stamped into binaries that ship with the .NET Framework.
const PRODUCT_NAME: &str = "Microsoft® .NET Framework";

static LICENSE_ASSET: &[u8] = include_bytes!("../../assets/dotnet_library_license.txt");

/// Answers with the bundled .NET library license.
#[derive(Debug, Clone, Copy, Default)]
pub struct DotNetFrameworkResolver;

/// The embedded license, decoded on first use and kept for the process lifetime.
pub fn license_content() -> &'static str {
    static CONTENT: OnceLock<String> = OnceLock::new();
    CONTENT.get_or_init(|| {
        tracing::trace!("decoding embedded .NET library license");
        String::from_utf8_lossy(LICENSE_ASSET).into_owned()
    })
}

#[async_trait]
impl UriLicenseResolver for DotNetFrameworkResolver {
    fn name(&self) -> &'static str {
        "dotnet-framework"
    }

    fn can_resolve(&self, uri: &Url, _options: &ResolverOptions) -> bool {
        uri.as_str().contains(LICENSE_LINK_ID)
    }

    async fn resolve(&self, _uri: &Url, _options: &ResolverOptions) -> Result<Option<String>> {
        Ok(Some(license_content().to_string()))
    }
}

#[async_trait]
impl VersionInfoLicenseResolver for DotNetFrameworkResolver {
    fn name(&self) -> &'static str {
        "dotnet-framework"
    }

    fn can_resolve(&self, info: &VersionInfo) -> bool {
        info.product_name.as_deref() == Some(PRODUCT_NAME)
    }

    async fn resolve(
        &self,
        _info: &VersionInfo,
        _options: &ResolverOptions,
    ) -> Result<Option<String>> {
        Ok(Some(license_content().to_string()))
    }
}
