//! Pass-through proxy for externally hosted images.
//!
//! Pages never point `<img>` at a foreign origin; they point at the proxy path with the
//! absolute source in the `u` query parameter. Bodies are streamed back untouched.

use crate::config::env_or;
use crate::error::EdgeError;
use anyhow::Context;
use reqwest::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use std::time::Duration;
use url::Url;

/// Route the proxy is mounted at.
pub const MEDIA_PROXY_PATH: &str = "/api/fe-media";

const DEFAULT_MAX_AGE_SECS: u64 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Builds the proxy path for an absolute media URL.
pub fn proxied_src(absolute_url: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("u", absolute_url)
        .finish();
    format!("{MEDIA_PROXY_PATH}?{query}")
}

/// Validates the raw `u` parameter.
pub fn parse_source(raw: Option<&str>) -> Result<Url, EdgeError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(EdgeError::BadRequest("Missing parameter"))?;
    let url = Url::parse(raw).map_err(|_| EdgeError::BadRequest("Invalid parameter"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(EdgeError::BadRequest("Invalid parameter")),
    }
}

#[derive(Debug)]
pub struct ProxiedMedia {
    pub content_type: Option<HeaderValue>,
    pub cache_control: HeaderValue,
    upstream: reqwest::Response,
}

impl ProxiedMedia {
    /// The upstream response; its body has not been read yet.
    pub fn into_upstream(self) -> reqwest::Response {
        self.upstream
    }
}

#[derive(Debug, Clone)]
pub struct MediaProxy {
    http: reqwest::Client,
    cache_control: HeaderValue,
}

impl MediaProxy {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(
            Duration::from_secs(env_or("MEDIA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            Duration::from_secs(env_or("MEDIA_CACHE_MAX_AGE_SECS", DEFAULT_MAX_AGE_SECS)),
        )
    }

    pub fn new(timeout: Duration, max_age: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build media proxy http client")?;
        let cache_control = HeaderValue::from_str(&format!("public, max-age={}", max_age.as_secs()))
            .context("invalid cache-control value")?;

        Ok(Self {
            http,
            cache_control,
        })
    }

    pub async fn fetch(&self, raw_source: Option<&str>) -> Result<ProxiedMedia, EdgeError> {
        let source = parse_source(raw_source)?;

        let res = self
            .http
            .get(source.clone())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(%source, error = %err, "media fetch failed");
                EdgeError::transport(err)
            })?;

        let status = res.status();
        if !status.is_success() {
            tracing::debug!(%source, %status, "media upstream returned non-success");
            return Err(EdgeError::UpstreamStatus(status.as_u16()));
        }

        Ok(ProxiedMedia {
            content_type: res.headers().get(CONTENT_TYPE).cloned(),
            cache_control: self.cache_control.clone(),
            upstream: res,
        })
    }
}
