pub mod ads;
pub mod content;
pub mod domain;
pub mod error;
pub mod feed;
pub mod media;
pub mod price;

pub use error::EdgeError;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_CONTENT_API_BASE: &str = "http://backend:8000/api";
    const DEFAULT_PUBLIC_API_BASE: &str = "/api";
    const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub content_api_base: String,
        pub public_api_base: String,
        pub price_api_key: Option<String>,
        pub price_api_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub upstream_timeout: Duration,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let public_api_base = non_empty_var("NEXT_PUBLIC_API_BASE");
            let content_api_base = non_empty_var("NEXT_SERVER_API_BASE")
                .or_else(|| public_api_base.clone())
                .unwrap_or_else(|| DEFAULT_CONTENT_API_BASE.to_string());

            let price_api_key = non_empty_var("PRICE_API_KEY")
                .or_else(|| non_empty_var("COINGECKO_PRO_API_KEY"))
                .or_else(|| non_empty_var("COINGECKO_API_KEY"))
                .or_else(|| non_empty_var("COINGECKO_DEMO_API_KEY"));

            let upstream_timeout = match non_empty_var("UPSTREAM_TIMEOUT_SECS") {
                Some(s) => s
                    .parse::<u64>()
                    .with_context(|| format!("UPSTREAM_TIMEOUT_SECS must be an integer (got {s})"))?,
                None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
            };

            Ok(Self {
                content_api_base,
                public_api_base: public_api_base
                    .unwrap_or_else(|| DEFAULT_PUBLIC_API_BASE.to_string()),
                price_api_key,
                price_api_base_url: non_empty_var("PRICE_API_BASE_URL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                upstream_timeout: Duration::from_secs(upstream_timeout),
            })
        }

        /// Content API base with a trailing `/api` segment removed; relative media paths
        /// returned by the API are served from here.
        pub fn content_origin(&self) -> String {
            content_origin(&self.content_api_base)
        }
    }

    pub fn content_origin(api_base: &str) -> String {
        let trimmed = api_base.trim_end_matches('/');
        trimmed.strip_suffix("/api").unwrap_or(trimmed).to_string()
    }

    /// Reads an optional numeric tunable, falling back to `default` when unset or unparsable.
    pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn content_origin_strips_api_segment() {
            assert_eq!(content_origin("http://backend:8000/api"), "http://backend:8000");
            assert_eq!(content_origin("http://backend:8000/api/"), "http://backend:8000");
            assert_eq!(content_origin("https://cms.example.com"), "https://cms.example.com");
        }
    }
}
