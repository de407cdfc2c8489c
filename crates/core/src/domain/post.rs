use anyhow::{ensure, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    News,
    Column,
}

impl ContentType {
    /// Accepts the public path segments `news` and `columns`, case-insensitively.
    pub fn from_path_segment(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Some(Self::News),
            "columns" => Some(Self::Column),
            _ => None,
        }
    }

    pub fn path_segment(self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Column => "columns",
        }
    }

    /// Name the similarity endpoint uses for this type.
    pub fn similar_kind(self) -> &'static str {
        match self {
            Self::News => "news",
            Self::Column => "column",
        }
    }

    /// Validates an untyped upstream payload as a post of this type.
    pub fn parse_post(self, value: Value) -> anyhow::Result<Post> {
        let post = match self {
            Self::News => Post::News(
                serde_json::from_value::<NewsPost>(value).context("invalid news payload")?,
            ),
            Self::Column => Post::Column(
                serde_json::from_value::<ColumnPost>(value).context("invalid column payload")?,
            ),
        };
        ensure!(post.id() > 0, "post id must be positive");
        ensure!(!post.title().trim().is_empty(), "post title must be non-empty");
        Ok(post)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPost {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub resolved_image: Option<String>,
    /// Upstream fields without a typed home (`theme`, `hashtags`, ...), echoed back as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPost {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub content_body: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub resolved_image: Option<String>,
    /// Upstream fields without a typed home (`theme`, `hashtags`, ...), echoed back as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Content item of either type. Serializes as the bare upstream object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Post {
    News(NewsPost),
    Column(ColumnPost),
}

impl Post {
    pub fn id(&self) -> u64 {
        match self {
            Self::News(p) => p.id,
            Self::Column(p) => p.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::News(p) => &p.title,
            Self::Column(p) => &p.title,
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::News(_) => ContentType::News,
            Self::Column(_) => ContentType::Column,
        }
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::News(p) => p.published_at,
            Self::Column(p) => p.published_at,
        }
    }

    /// Source name for news, author for columns.
    pub fn byline(&self) -> Option<&str> {
        match self {
            Self::News(p) => p.source_name.as_deref(),
            Self::Column(p) => p.author_name.as_deref(),
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::News(p) => p.description.as_deref(),
            Self::Column(p) => p.content_body.as_deref(),
        }
    }

    /// Prefers the server-resolved image over the raw one.
    pub fn image(&self) -> Option<&str> {
        let (resolved, raw) = match self {
            Self::News(p) => (&p.resolved_image, &p.image_url),
            Self::Column(p) => (&p.resolved_image, &p.image_url),
        };
        resolved
            .as_deref()
            .or(raw.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarItem {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

/// One rendered step of a reading feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub post: Post,
    pub similar: Vec<SimilarItem>,
    pub social_links: Vec<SocialLink>,
}
