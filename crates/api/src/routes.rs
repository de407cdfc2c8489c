use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use feededge_core::ads::AdSelector;
use feededge_core::domain::banner::BannerView;
use feededge_core::domain::price::PriceSnapshot;
use feededge_core::feed::service::parse_cursor;
use feededge_core::feed::{FeedService, NextResponse};
use feededge_core::media::{MediaProxy, MEDIA_PROXY_PATH};
use feededge_core::price::PriceSnapshotCache;
use feededge_core::EdgeError;

#[derive(Clone)]
pub struct AppState {
    pub ads: Arc<AdSelector>,
    pub media: MediaProxy,
    pub feed: Arc<FeedService>,
    /// `None` when the price cache could not be configured; the widget then renders nothing.
    pub prices: Option<Arc<PriceSnapshotCache>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/fe-ads", get(get_ad))
        .route("/fe-prices", get(get_prices))
        .route("/fe-next/:content_type/:id", get(get_next_with_extras))
        .route("/api/next/:content_type/:id", get(get_next))
        .route(MEDIA_PROXY_PATH, get(get_media))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_ad(State(state): State<AppState>) -> Json<Option<BannerView>> {
    Json(state.ads.pick().await)
}

async fn get_prices(State(state): State<AppState>) -> Json<Option<PriceSnapshot>> {
    let Some(prices) = &state.prices else {
        return Json(None);
    };
    match prices.get_snapshot().await {
        Ok(snapshot) => Json(Some(snapshot)),
        Err(err) => {
            tracing::debug!(error = %err, "no price snapshot to render");
            Json(None)
        }
    }
}

async fn get_next_with_extras(
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
) -> Json<NextResponse> {
    let Some((content_type, id)) = parse_cursor(&content_type, &id) else {
        return Json(NextResponse::none());
    };
    Json(state.feed.next_with_extras(content_type, id).await)
}

async fn get_next(
    State(state): State<AppState>,
    Path((content_type, id)): Path<(String, String)>,
) -> Json<NextResponse> {
    let Some((content_type, id)) = parse_cursor(&content_type, &id) else {
        return Json(NextResponse::none());
    };
    Json(state.feed.next_plain(content_type, id).await)
}

#[derive(Debug, Deserialize)]
struct MediaParams {
    u: Option<String>,
}

async fn get_media(State(state): State<AppState>, Query(params): Query<MediaParams>) -> Response {
    let media = match state.media.fetch(params.u.as_deref()).await {
        Ok(media) => media,
        Err(err) => return media_error_response(err),
    };

    let mut headers = HeaderMap::new();
    if let Some(content_type) = media.content_type.clone() {
        headers.insert(CONTENT_TYPE, content_type);
    }
    headers.insert(CACHE_CONTROL, media.cache_control.clone());

    let body = Body::from_stream(media.into_upstream().bytes_stream());
    (StatusCode::OK, headers, body).into_response()
}

fn media_error_response(err: EdgeError) -> Response {
    match err {
        EdgeError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        EdgeError::UpstreamStatus(code) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY),
            "Upstream error",
        )
            .into_response(),
        EdgeError::Transport(_) => (StatusCode::BAD_GATEWAY, "Fetch failed").into_response(),
        EdgeError::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feededge_core::content::ContentApi;
    use feededge_core::domain::banner::Banner;
    use feededge_core::domain::post::{ContentType, Post, SimilarItem, SocialLink};
    use httpmock::{Method::GET, MockServer};
    use serde_json::{json, Value};
    use std::time::Duration;

    struct StubContent {
        banners: Vec<Banner>,
    }

    #[async_trait::async_trait]
    impl ContentApi for StubContent {
        async fn banners(&self) -> anyhow::Result<Vec<Banner>> {
            Ok(self.banners.clone())
        }

        async fn next_post(&self, ct: ContentType, id: u64) -> anyhow::Result<Option<Post>> {
            if id == 1 {
                return ct
                    .parse_post(json!({"id": 2, "title": "Two", "theme": "markets"}))
                    .map(Some);
            }
            Ok(None)
        }

        async fn similar(
            &self,
            _: ContentType,
            _: u64,
            _: usize,
        ) -> anyhow::Result<Vec<SimilarItem>> {
            Ok(Vec::new())
        }

        async fn social_links(&self) -> anyhow::Result<Vec<SocialLink>> {
            anyhow::bail!("social links offline")
        }
    }

    fn state(banners: Vec<Banner>) -> AppState {
        let content: Arc<dyn ContentApi> = Arc::new(StubContent { banners });
        AppState {
            ads: Arc::new(AdSelector::new(content.clone(), "http://backend:8000")),
            media: MediaProxy::new(Duration::from_secs(5), Duration::from_secs(60)).unwrap(),
            feed: Arc::new(FeedService::new(content)),
            prices: None,
        }
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    fn media(u: Option<String>) -> Query<MediaParams> {
        Query(MediaParams { u })
    }

    #[tokio::test]
    async fn media_requires_u() {
        let res = get_media(State(state(Vec::new())), media(None)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_bytes(res).await, b"Missing parameter");
    }

    #[tokio::test]
    async fn media_passes_through_content_type() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/logo.png");
            then.status(200)
                .header("content-type", "image/png")
                .header("set-cookie", "a=b")
                .body("PNGDATA");
        });

        let res = get_media(State(state(Vec::new())), media(Some(server.url("/logo.png")))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(res.headers()[CACHE_CONTROL], "public, max-age=60");
        assert!(res.headers().get("set-cookie").is_none());
        assert_eq!(body_bytes(res).await, b"PNGDATA");
    }

    #[tokio::test]
    async fn media_mirrors_upstream_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/private.png");
            then.status(403);
        });

        let res = get_media(
            State(state(Vec::new())),
            media(Some(server.url("/private.png"))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_bytes(res).await, b"Upstream error");
    }

    #[tokio::test]
    async fn media_transport_failure_is_bad_gateway() {
        let res = get_media(
            State(state(Vec::new())),
            media(Some("http://127.0.0.1:1/x.png".to_string())),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn next_rejects_invalid_cursor() {
        let Json(res) = get_next_with_extras(
            State(state(Vec::new())),
            Path(("videos".to_string(), "1".to_string())),
        )
        .await;
        assert_eq!(serde_json::to_value(res).unwrap(), json!({"next": null}));

        let Json(res) = get_next(
            State(state(Vec::new())),
            Path(("news".to_string(), "0".to_string())),
        )
        .await;
        assert_eq!(serde_json::to_value(res).unwrap(), json!({"next": null}));
    }

    #[tokio::test]
    async fn next_with_extras_degrades_side_lists() {
        let Json(res) = get_next_with_extras(
            State(state(Vec::new())),
            Path(("news".to_string(), "1".to_string())),
        )
        .await;
        let v: Value = serde_json::to_value(res).unwrap();
        assert_eq!(v["next"]["id"], 2);
        assert_eq!(v["next"]["theme"], "markets");
        assert_eq!(v["similar"], json!([]));
        assert_eq!(v["socialLinks"], json!([]));
    }

    #[tokio::test]
    async fn ads_and_prices_render_null_when_empty() {
        let Json(ad) = get_ad(State(state(Vec::new()))).await;
        assert!(ad.is_none());

        let Json(prices) = get_prices(State(state(Vec::new()))).await;
        assert!(prices.is_none());
    }

    #[tokio::test]
    async fn ads_return_proxied_banner() {
        let banners = vec![Banner {
            id: 3,
            name: "Sponsor".to_string(),
            destination_url: Some("https://sponsor.example.com".to_string()),
            image_url: Some("/media/ads/3.png".to_string()),
            weight: Some(2),
        }];
        let Json(ad) = get_ad(State(state(banners))).await;
        let ad = ad.unwrap();
        assert_eq!(ad.id, 3);
        assert!(ad.src.starts_with("/api/fe-media?u=http%3A%2F%2Fbackend%3A8000"));
    }
}
