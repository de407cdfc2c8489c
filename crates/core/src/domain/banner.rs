use serde::{Deserialize, Serialize};

/// Sponsor banner as returned by the content API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "url", default)]
    pub destination_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub weight: Option<i64>,
}

/// Upper bound on a single banner's weight, so a total over any banner set fits in `u64`.
pub const MAX_WEIGHT: u64 = u32::MAX as u64;

impl Banner {
    /// Absent or non-positive weights count as 1; oversized ones are capped at [`MAX_WEIGHT`].
    pub fn effective_weight(&self) -> u64 {
        match self.weight {
            Some(w) if w > 0 => (w as u64).min(MAX_WEIGHT),
            _ => 1,
        }
    }

    pub fn is_usable(&self) -> bool {
        fn present(s: &Option<String>) -> bool {
            s.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        present(&self.image_url) && present(&self.destination_url)
    }
}

/// Public shape served to the page: `src` always points at the media proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerView {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub src: String,
}
