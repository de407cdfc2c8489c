//! Typed access to the upstream content API (news, columns, banners, social links).

pub mod http;
mod wire;

use crate::domain::banner::Banner;
use crate::domain::post::{ContentType, Post, SimilarItem, SocialLink};

pub use http::HttpContentApi;

#[async_trait::async_trait]
pub trait ContentApi: Send + Sync {
    async fn banners(&self) -> anyhow::Result<Vec<Banner>>;

    /// The post that follows `id` in the upstream ordering, if any.
    async fn next_post(&self, content_type: ContentType, id: u64) -> anyhow::Result<Option<Post>>;

    async fn similar(
        &self,
        content_type: ContentType,
        id: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<SimilarItem>>;

    async fn social_links(&self) -> anyhow::Result<Vec<SocialLink>>;
}
