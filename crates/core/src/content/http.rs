use crate::config::Settings;
use crate::content::wire::{Listing, NextEnvelope};
use crate::content::ContentApi;
use crate::domain::banner::Banner;
use crate::domain::post::{ContentType, Post, SimilarItem, SocialLink};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpContentApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpContentApi {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.content_api_base, settings.upstream_timeout)
    }

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // Every read goes to the origin; nothing here is cacheable across requests.
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build content api http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        let res = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("content api request failed: {url}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read content api response")?;
        if !status.is_success() {
            anyhow::bail!("content api HTTP {status} for {url}");
        }

        serde_json::from_str::<Value>(&text)
            .with_context(|| format!("content api response is not valid JSON: {url}"))
    }

    async fn get_listing(&self, path: &str, query: &[(&str, String)]) -> Result<Listing> {
        let raw = self.get_json(path, query).await?;
        serde_json::from_value::<Listing>(raw)
            .with_context(|| format!("content api list response has unexpected shape: {path}"))
    }
}

#[async_trait::async_trait]
impl ContentApi for HttpContentApi {
    async fn banners(&self) -> Result<Vec<Banner>> {
        Ok(self.get_listing("ads/", &[]).await?.decode("banners"))
    }

    async fn next_post(&self, content_type: ContentType, id: u64) -> Result<Option<Post>> {
        let path = format!("{}/{id}/next/", content_type.path_segment());
        let raw = self.get_json(&path, &[]).await?;
        let envelope = serde_json::from_value::<NextEnvelope>(raw)
            .context("next response has unexpected shape")?;

        match envelope.next {
            None | Some(Value::Null) => Ok(None),
            Some(v) => content_type.parse_post(v).map(Some),
        }
    }

    async fn similar(
        &self,
        content_type: ContentType,
        id: u64,
        limit: usize,
    ) -> Result<Vec<SimilarItem>> {
        let query = [
            ("type", content_type.similar_kind().to_string()),
            ("id", id.to_string()),
            ("limit", limit.to_string()),
        ];
        let mut items: Vec<SimilarItem> = self
            .get_listing("posts/similar/", &query)
            .await?
            .decode("similar");
        items.truncate(limit);
        Ok(items)
    }

    async fn social_links(&self) -> Result<Vec<SocialLink>> {
        Ok(self
            .get_listing("social-links/", &[])
            .await?
            .decode("social_links"))
    }
}
