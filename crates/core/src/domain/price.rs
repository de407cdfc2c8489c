use anyhow::{ensure, Context};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TRACKED_ASSETS: &str = "BTC:bitcoin,ETH:ethereum";

/// A symbol shown on the site and the id the price upstream knows it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedAsset {
    pub symbol: String,
    pub upstream_id: String,
}

impl TrackedAsset {
    /// Parses `SYMBOL:upstream_id` pairs separated by commas.
    pub fn parse_list(s: &str) -> anyhow::Result<Vec<Self>> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (symbol, upstream_id) = part
                .split_once(':')
                .with_context(|| format!("tracked asset must be SYMBOL:id (got {part})"))?;
            let symbol = symbol.trim().to_ascii_uppercase();
            let upstream_id = upstream_id.trim().to_ascii_lowercase();
            ensure!(
                !symbol.is_empty() && !upstream_id.is_empty(),
                "tracked asset must be SYMBOL:id (got {part})"
            );
            out.push(Self {
                symbol,
                upstream_id,
            });
        }
        ensure!(!out.is_empty(), "at least one tracked asset is required");
        Ok(out)
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                symbol: "BTC".to_string(),
                upstream_id: "bitcoin".to_string(),
            },
            Self {
                symbol: "ETH".to_string(),
                upstream_id: "ethereum".to_string(),
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuote {
    pub price: Decimal,
    pub change_24h_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub captured_at: DateTime<Utc>,
    pub assets: BTreeMap<String, AssetQuote>,
}

impl PriceSnapshot {
    pub fn quote(&self, symbol: &str) -> Option<&AssetQuote> {
        self.assets.get(symbol)
    }
}
