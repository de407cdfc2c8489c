//! Process-wide price snapshot with a freshness window and serve-stale-on-error.

pub mod coingecko;

use crate::config::{env_or, Settings};
use crate::domain::price::{AssetQuote, PriceSnapshot, TrackedAsset, DEFAULT_TRACKED_ASSETS};
use crate::error::EdgeError;
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

pub use coingecko::CoinGeckoClient;

const DEFAULT_TTL_SECS: u64 = 60;

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetches quotes for every asset in a single upstream call, keyed by symbol.
    async fn fetch_quotes(&self, assets: &[TrackedAsset]) -> Result<BTreeMap<String, AssetQuote>>;
}

#[derive(Debug, Clone)]
struct CachedSnapshot {
    snapshot: PriceSnapshot,
    refreshed_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    cached: Option<CachedSnapshot>,
    refreshing: bool,
    // Bumped when a refresh settles, successful or not.
    generation: u64,
}

enum Plan {
    Serve(PriceSnapshot),
    Refresh,
    Wait(u64),
}

pub struct PriceSnapshotCache {
    source: Arc<dyn PriceSource>,
    assets: Vec<TrackedAsset>,
    ttl: Duration,
    // Never held across an await; the upstream call runs with the lock released.
    state: Mutex<CacheState>,
    settled: Notify,
}

impl PriceSnapshotCache {
    pub fn new(source: Arc<dyn PriceSource>, assets: Vec<TrackedAsset>, ttl: Duration) -> Self {
        Self {
            source,
            assets,
            ttl,
            state: Mutex::new(CacheState::default()),
            settled: Notify::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let source = CoinGeckoClient::from_settings(settings)?;
        let assets = match std::env::var("PRICE_ASSETS") {
            Ok(s) if !s.trim().is_empty() => TrackedAsset::parse_list(&s)?,
            _ => TrackedAsset::parse_list(DEFAULT_TRACKED_ASSETS)?,
        };
        let ttl = Duration::from_secs(env_or("PRICE_TTL_SECS", DEFAULT_TTL_SECS));

        Ok(Self::new(Arc::new(source), assets, ttl))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, state: &mut CacheState) {
        state.refreshing = false;
        state.generation += 1;
        self.settled.notify_waiters();
    }

    /// At most one refresh runs at a time. While it runs, callers holding a stale
    /// snapshot get it immediately; only a cold cache waits, and only for that one call.
    pub async fn get_snapshot(&self) -> Result<PriceSnapshot, EdgeError> {
        let mut seen_generation = None;
        loop {
            let notified = self.settled.notified();
            let plan = {
                let mut state = self.lock();
                let servable = state
                    .cached
                    .as_ref()
                    .filter(|c| state.refreshing || c.refreshed_at.elapsed() < self.ttl)
                    .map(|c| c.snapshot.clone());

                if let Some(snapshot) = servable {
                    Plan::Serve(snapshot)
                } else if state.refreshing {
                    Plan::Wait(state.generation)
                } else if state.cached.is_none()
                    && seen_generation.is_some_and(|g| g != state.generation)
                {
                    // The refresh this caller waited on failed cold.
                    return Err(EdgeError::UpstreamUnavailable);
                } else {
                    state.refreshing = true;
                    Plan::Refresh
                }
            };

            match plan {
                Plan::Serve(snapshot) => return Ok(snapshot),
                Plan::Refresh => return self.refresh().await,
                Plan::Wait(generation) => {
                    seen_generation = Some(generation);
                    notified.await;
                }
            }
        }
    }

    async fn refresh(&self) -> Result<PriceSnapshot, EdgeError> {
        let mut in_flight = InFlight {
            cache: self,
            armed: true,
        };
        let fetched = self.source.fetch_quotes(&self.assets).await;

        let mut state = self.lock();
        in_flight.armed = false;
        self.settle(&mut state);

        match fetched {
            Ok(assets) => {
                let snapshot = PriceSnapshot {
                    captured_at: chrono::Utc::now(),
                    assets,
                };
                state.cached = Some(CachedSnapshot {
                    snapshot: snapshot.clone(),
                    refreshed_at: Instant::now(),
                });
                tracing::debug!(source = self.source.source_name(), "price snapshot refreshed");
                Ok(snapshot)
            }
            Err(err) => match state.cached.as_ref() {
                Some(cached) => {
                    tracing::warn!(
                        source = self.source.source_name(),
                        captured_at = %cached.snapshot.captured_at,
                        error = %err,
                        "price refresh failed; serving stale snapshot"
                    );
                    Ok(cached.snapshot.clone())
                }
                None => {
                    tracing::warn!(
                        source = self.source.source_name(),
                        error = %err,
                        "price refresh failed with no cached snapshot"
                    );
                    Err(EdgeError::UpstreamUnavailable)
                }
            },
        }
    }
}

/// Releases the refresh slot if the refreshing caller is dropped mid-fetch.
struct InFlight<'a> {
    cache: &'a PriceSnapshotCache,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.cache.lock();
            self.cache.settle(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct ScriptedSource {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl PriceSource for ScriptedSource {
        fn source_name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_quotes(
            &self,
            assets: &[TrackedAsset],
        ) -> Result<BTreeMap<String, AssetQuote>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("upstream down");
            }
            Ok(assets
                .iter()
                .map(|a| {
                    (
                        a.symbol.clone(),
                        AssetQuote {
                            price: Decimal::from(n as u64 * 100),
                            change_24h_pct: Decimal::ZERO,
                        },
                    )
                })
                .collect())
        }
    }

    fn cache(source: Arc<ScriptedSource>) -> PriceSnapshotCache {
        PriceSnapshotCache::new(source, TrackedAsset::defaults(), Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn serves_cached_value_within_ttl() {
        let source = Arc::new(ScriptedSource::default());
        let cache = cache(source.clone());

        let first = cache.get_snapshot().await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.get_snapshot().await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.assets.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_exactly_once_after_ttl() {
        let source = Arc::new(ScriptedSource::default());
        let cache = cache(source.clone());

        cache.get_snapshot().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let refreshed = cache.get_snapshot().await.unwrap();
        cache.get_snapshot().await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(refreshed.quote("BTC").unwrap().price, Decimal::from(200u64));
    }

    #[tokio::test(start_paused = true)]
    async fn serves_stale_snapshot_when_refresh_fails() {
        let source = Arc::new(ScriptedSource::default());
        let cache = cache(source.clone());

        let first = cache.get_snapshot().await.unwrap();
        source.set_failing(true);
        tokio::time::advance(Duration::from_secs(120)).await;
        let stale = cache.get_snapshot().await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(stale, first);
    }

    #[tokio::test(start_paused = true)]
    async fn cold_failure_is_upstream_unavailable() {
        let source = Arc::new(ScriptedSource::default());
        source.set_failing(true);
        let cache = cache(source.clone());

        let err = cache.get_snapshot().await.unwrap_err();
        assert!(matches!(err, EdgeError::UpstreamUnavailable));

        // Recovers on the next call once the upstream is back.
        source.set_failing(false);
        assert!(cache.get_snapshot().await.is_ok());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn racing_callers_share_one_refresh() {
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let cache = cache(source.clone());

        let (a, b) = tokio::join!(cache.get_snapshot(), cache.get_snapshot());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(source.calls(), 1);
    }

    async fn timed(cache: &PriceSnapshotCache) -> (Result<PriceSnapshot, EdgeError>, Duration) {
        let started = Instant::now();
        let res = cache.get_snapshot().await;
        (res, started.elapsed())
    }

    #[tokio::test(start_paused = true)]
    async fn outage_serves_stale_without_queueing_callers() {
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let cache = cache(source.clone());
        let first = cache.get_snapshot().await.unwrap();

        source.set_failing(true);
        tokio::time::advance(Duration::from_secs(61)).await;
        let (a, b, c) = tokio::join!(timed(&cache), timed(&cache), timed(&cache));

        for (res, waited) in [a, b, c] {
            assert_eq!(res.unwrap(), first);
            assert!(waited <= Duration::from_secs(10), "waited {waited:?}");
        }
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cold_outage_fails_waiters_with_one_call() {
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        source.set_failing(true);
        let cache = cache(source.clone());

        let (a, b, c) = tokio::join!(timed(&cache), timed(&cache), timed(&cache));
        for (res, waited) in [a, b, c] {
            assert!(matches!(res, Err(EdgeError::UpstreamUnavailable)));
            assert!(waited <= Duration::from_secs(10), "waited {waited:?}");
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_refresh_frees_the_slot() {
        let source = Arc::new(ScriptedSource {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let cache = cache(source.clone());

        let abandoned = tokio::time::timeout(Duration::from_secs(1), cache.get_snapshot()).await;
        assert!(abandoned.is_err());

        assert!(cache.get_snapshot().await.is_ok());
        assert_eq!(source.calls(), 2);
    }
}
