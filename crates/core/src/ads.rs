use crate::content::ContentApi;
use crate::domain::banner::{Banner, BannerView};
use crate::media::proxied_src;
use rand::Rng;
use std::sync::Arc;

/// Picks one sponsor banner per call, weighted, from the live banner set.
pub struct AdSelector {
    content: Arc<dyn ContentApi>,
    content_origin: String,
}

impl AdSelector {
    pub fn new(content: Arc<dyn ContentApi>, content_origin: impl Into<String>) -> Self {
        Self {
            content,
            content_origin: content_origin.into().trim_end_matches('/').to_string(),
        }
    }

    /// `None` when the banner set is empty, unusable or unreachable.
    pub async fn pick(&self) -> Option<BannerView> {
        let banners = match self.content.banners().await {
            Ok(banners) => banners,
            Err(err) => {
                tracing::warn!(error = %err, "banner fetch failed; rendering no ad");
                return None;
            }
        };
        self.select(&banners, &mut rand::rng())
    }

    pub fn select<R: Rng>(&self, banners: &[Banner], rng: &mut R) -> Option<BannerView> {
        let usable: Vec<&Banner> = banners.iter().filter(|b| b.is_usable()).collect();
        let chosen = weighted_pick(&usable, rng)?;
        Some(self.view(chosen))
    }

    fn view(&self, banner: &Banner) -> BannerView {
        let image = banner.image_url.as_deref().unwrap_or_default().trim();
        BannerView {
            id: banner.id,
            name: banner.name.clone(),
            url: banner
                .destination_url
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_string(),
            src: proxied_src(&absolute_url(&self.content_origin, image)),
        }
    }
}

/// Linear-scan weighted draw: `r ~ U[0, total)`, subtract weights in order, first `r <= 0` wins.
pub fn weighted_pick<'a, R: Rng>(banners: &[&'a Banner], rng: &mut R) -> Option<&'a Banner> {
    let last = *banners.last()?;
    let total = banners
        .iter()
        .fold(0u64, |acc, b| acc.saturating_add(b.effective_weight()));

    let mut r = rng.random::<f64>() * total as f64;
    for &banner in banners {
        r -= banner.effective_weight() as f64;
        if r <= 0.0 {
            return Some(banner);
        }
    }
    // Float residue can leave r marginally above zero after the final subtraction.
    Some(last)
}

/// Leaves absolute http(s) URLs alone; joins anything else onto `origin`.
pub fn absolute_url(origin: &str, path: &str) -> String {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return path.to_string();
    }
    if path.starts_with('/') {
        format!("{origin}{path}")
    } else {
        format!("{origin}/{path}")
    }
}
