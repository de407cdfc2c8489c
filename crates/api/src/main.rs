use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feededge_core::ads::AdSelector;
use feededge_core::content::{ContentApi, HttpContentApi};
use feededge_core::feed::FeedService;
use feededge_core::media::MediaProxy;
use feededge_core::price::PriceSnapshotCache;

mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = feededge_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let content: Arc<dyn ContentApi> = Arc::new(HttpContentApi::from_settings(&settings)?);

    let prices = match PriceSnapshotCache::from_settings(&settings) {
        Ok(cache) => {
            tracing::info!(
                ttl_secs = cache.ttl().as_secs(),
                authenticated = settings.price_api_key.is_some(),
                "price cache ready"
            );
            Some(Arc::new(cache))
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "price cache misconfigured; price widget disabled");
            None
        }
    };

    let state = routes::AppState {
        ads: Arc::new(AdSelector::new(content.clone(), settings.content_origin())),
        media: MediaProxy::from_env()?,
        feed: Arc::new(FeedService::new(content)),
        prices,
    };

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(
        %addr,
        content_api = %settings.content_api_base,
        public_api = %settings.public_api_base,
        "edge listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &feededge_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
