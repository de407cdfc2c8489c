use crate::domain::post::{ContentType, FeedItem, SimilarItem, SocialLink};
use crate::feed::walker::NextSource;
use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, CACHE_CONTROL};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct WireNext {
    #[serde(default)]
    next: Option<Value>,
    #[serde(default)]
    similar: Vec<Value>,
    #[serde(default, rename = "socialLinks")]
    social_links: Vec<Value>,
}

fn lenient<T: serde::de::DeserializeOwned>(raw: Vec<Value>) -> Vec<T> {
    raw.into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

/// Reads the edge's `/fe-next/{type}/{id}` endpoint.
#[derive(Debug, Clone)]
pub struct HttpNextSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpNextSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build feed http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, content_type: ContentType, after_id: u64) -> String {
        format!(
            "{}/fe-next/{}/{after_id}",
            self.base_url,
            content_type.path_segment()
        )
    }
}

#[async_trait::async_trait]
impl NextSource for HttpNextSource {
    async fn fetch_next(
        &self,
        content_type: ContentType,
        after_id: u64,
    ) -> Result<Option<FeedItem>> {
        let url = self.url(content_type, after_id);
        let res = self
            .http
            .get(&url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .send()
            .await
            .with_context(|| format!("next request failed: {url}"))?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("next endpoint HTTP {status}");
        }

        let wire = res
            .json::<WireNext>()
            .await
            .context("next response is not valid JSON")?;

        let post = match wire.next {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => content_type.parse_post(v)?,
        };

        Ok(Some(FeedItem {
            post,
            similar: lenient::<SimilarItem>(wire.similar),
            social_links: lenient::<SocialLink>(wire.social_links),
        }))
    }
}
