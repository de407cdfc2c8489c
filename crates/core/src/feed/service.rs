use crate::content::ContentApi;
use crate::domain::post::{ContentType, FeedItem, Post, SimilarItem, SocialLink};
use crate::feed::walker::NextSource;
use serde::Serialize;
use std::sync::Arc;

pub const SIMILAR_LIMIT: usize = 2;

/// Body of the "next" endpoints. Side lists are omitted when the request itself was invalid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextResponse {
    pub next: Option<Post>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similar: Option<Vec<SimilarItem>>,
    #[serde(rename = "socialLinks", skip_serializing_if = "Option::is_none")]
    pub social_links: Option<Vec<SocialLink>>,
}

impl NextResponse {
    pub fn none() -> Self {
        Self {
            next: None,
            similar: None,
            social_links: None,
        }
    }
}

/// Parses `/{type}/{id}` path segments; `id` must be a positive integer.
pub fn parse_cursor(type_segment: &str, id_segment: &str) -> Option<(ContentType, u64)> {
    let content_type = ContentType::from_path_segment(type_segment)?;
    let id = id_segment.trim().parse::<u64>().ok().filter(|id| *id > 0)?;
    Some((content_type, id))
}

fn best_effort<T>(what: &'static str, res: anyhow::Result<Vec<T>>) -> Vec<T> {
    res.unwrap_or_else(|err| {
        tracing::warn!(what, error = %err, "side lookup failed; using empty list");
        Vec::new()
    })
}

pub struct FeedService {
    content: Arc<dyn ContentApi>,
    similar_limit: usize,
}

impl FeedService {
    pub fn new(content: Arc<dyn ContentApi>) -> Self {
        Self {
            content,
            similar_limit: SIMILAR_LIMIT,
        }
    }

    async fn resolve_next(&self, content_type: ContentType, id: u64) -> Option<Post> {
        match self.content.next_post(content_type, id).await {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(
                    content_type = content_type.path_segment(),
                    id,
                    error = %err,
                    "next lookup failed; treating as end of feed"
                );
                None
            }
        }
    }

    /// Next post only.
    pub async fn next_plain(&self, content_type: ContentType, id: u64) -> NextResponse {
        NextResponse {
            next: self.resolve_next(content_type, id).await,
            ..NextResponse::none()
        }
    }

    /// Next post plus similar items for it and the current social links.
    pub async fn next_with_extras(&self, content_type: ContentType, id: u64) -> NextResponse {
        let next = self.resolve_next(content_type, id).await;

        let similar = async {
            match &next {
                Some(post) => best_effort(
                    "similar",
                    self.content
                        .similar(content_type, post.id(), self.similar_limit)
                        .await,
                ),
                None => Vec::new(),
            }
        };
        let social_links = async { best_effort("social_links", self.content.social_links().await) };
        let (similar, social_links) = tokio::join!(similar, social_links);

        NextResponse {
            next,
            similar: Some(similar),
            social_links: Some(social_links),
        }
    }
}

/// Lets a walker run in-process against the service, skipping HTTP.
#[async_trait::async_trait]
impl NextSource for FeedService {
    async fn fetch_next(
        &self,
        content_type: ContentType,
        after_id: u64,
    ) -> anyhow::Result<Option<FeedItem>> {
        let res = self.next_with_extras(content_type, after_id).await;
        Ok(res.next.map(|post| FeedItem {
            post,
            similar: res.similar.unwrap_or_default(),
            social_links: res.social_links.unwrap_or_default(),
        }))
    }
}
