use crate::config::Settings;
use crate::domain::price::{AssetQuote, TrackedAsset};
use crate::price::PriceSource;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const VS_CURRENCY: &str = "usd";

#[derive(Debug, Deserialize)]
struct WirePrice {
    usd: Option<f64>,
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

/// CoinGecko `simple/price`, one batched call for all tracked assets.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .price_api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(&base_url, settings.price_api_key.clone(), settings.upstream_timeout)
    }

    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build price api http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            // The same key is accepted on either plan's header.
            let value = HeaderValue::from_str(key).context("price api key is not a valid header")?;
            headers.insert("x-cg-pro-api-key", value.clone());
            headers.insert("x-cg-demo-api-key", value);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl PriceSource for CoinGeckoClient {
    fn source_name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_quotes(&self, assets: &[TrackedAsset]) -> Result<BTreeMap<String, AssetQuote>> {
        let ids = assets
            .iter()
            .map(|a| a.upstream_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/simple/price", self.base_url);

        let res = self
            .http
            .get(&url)
            .headers(self.headers()?)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", VS_CURRENCY),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await
            .context("price api request failed")?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("price api HTTP {status}");
        }

        let body = res
            .json::<HashMap<String, WirePrice>>()
            .await
            .context("price api response has unexpected shape")?;

        let mut out = BTreeMap::new();
        for asset in assets {
            let wire = body
                .get(&asset.upstream_id)
                .with_context(|| format!("price api response missing {}", asset.upstream_id))?;
            let price = wire
                .usd
                .and_then(Decimal::from_f64)
                .with_context(|| format!("price api returned no usd price for {}", asset.upstream_id))?;
            let change = wire
                .usd_24h_change
                .and_then(Decimal::from_f64)
                .unwrap_or(Decimal::ZERO);

            out.insert(
                asset.symbol.clone(),
                AssetQuote {
                    price,
                    change_24h_pct: change,
                },
            );
        }
        Ok(out)
    }
}
