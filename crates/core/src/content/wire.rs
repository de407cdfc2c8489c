use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// List endpoints answer either a paginated `{ "results": [...] }` object or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing {
    Paged {
        #[serde(default)]
        results: Vec<Value>,
    },
    Bare(Vec<Value>),
}

impl Listing {
    /// Decodes each entry independently; malformed entries are dropped.
    pub(crate) fn decode<T: DeserializeOwned>(self, what: &'static str) -> Vec<T> {
        let raw = match self {
            Self::Paged { results } => results,
            Self::Bare(items) => items,
        };
        let total = raw.len();
        let out: Vec<T> = raw
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if out.len() != total {
            tracing::debug!(what, total, kept = out.len(), "dropped malformed list entries");
        }
        out
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextEnvelope {
    #[serde(default)]
    pub next: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::SocialLink;
    use serde_json::json;

    #[test]
    fn decodes_paged_and_bare_listings() {
        let paged: Listing = serde_json::from_value(json!({
            "count": 2,
            "results": [
                {"name": "Telegram", "url": "https://t.me/x"},
                {"name": "broken"}
            ]
        }))
        .unwrap();
        let links: Vec<SocialLink> = paged.decode("social_links");
        assert_eq!(links.len(), 1);

        let bare: Listing =
            serde_json::from_value(json!([{"name": "X", "url": "https://x.com/y", "order": 2}]))
                .unwrap();
        let links: Vec<SocialLink> = bare.decode("social_links");
        assert_eq!(links[0].order, Some(2));
    }

    #[test]
    fn missing_results_is_empty() {
        let paged: Listing = serde_json::from_value(json!({"detail": "x"})).unwrap();
        let links: Vec<SocialLink> = paged.decode("social_links");
        assert!(links.is_empty());
    }
}
