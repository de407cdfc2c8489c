use crate::domain::post::{ContentType, FeedItem};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Idle,
    Loading,
    Finished,
}

/// Position of one reading view. `current_id == None` means the walk is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub content_type: ContentType,
    pub current_id: Option<u64>,
}

/// The single request a walker is allowed to have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextRequest {
    pub content_type: ContentType,
    pub after_id: u64,
}

#[async_trait::async_trait]
pub trait NextSource: Send + Sync {
    /// `Ok(None)` when there is no item after `after_id`.
    async fn fetch_next(
        &self,
        content_type: ContentType,
        after_id: u64,
    ) -> anyhow::Result<Option<FeedItem>>;
}

/// Cursor-driven infinite feed.
///
/// Transitions are split into [`FeedWalker::on_intersect`] (may start a request) and
/// [`FeedWalker::complete`] (applies its outcome) so the host decides how the request is
/// carried out. [`FeedWalker::advance`] runs both against a [`NextSource`].
#[derive(Debug)]
pub struct FeedWalker {
    cursor: FeedCursor,
    state: WalkState,
    items: Vec<FeedItem>,
    visited: HashSet<u64>,
    requests_issued: usize,
}

impl FeedWalker {
    pub fn new(content_type: ContentType, start_id: Option<u64>) -> Self {
        Self {
            cursor: FeedCursor {
                content_type,
                current_id: start_id,
            },
            state: WalkState::Idle,
            items: Vec::new(),
            visited: start_id.into_iter().collect(),
            requests_issued: 0,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn cursor(&self) -> FeedCursor {
        self.cursor
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn requests_issued(&self) -> usize {
        self.requests_issued
    }

    pub fn is_finished(&self) -> bool {
        self.state == WalkState::Finished
    }

    /// The sentinel came into view. Returns the request to issue, or `None` when one is
    /// already in flight or the walk is over.
    pub fn on_intersect(&mut self) -> Option<NextRequest> {
        if self.state != WalkState::Idle {
            return None;
        }
        let Some(after_id) = self.cursor.current_id else {
            self.finish();
            return None;
        };

        self.state = WalkState::Loading;
        self.requests_issued += 1;
        Some(NextRequest {
            content_type: self.cursor.content_type,
            after_id,
        })
    }

    /// Applies the outcome of the in-flight request.
    pub fn complete(&mut self, outcome: anyhow::Result<Option<FeedItem>>) -> WalkState {
        if self.state != WalkState::Loading {
            tracing::debug!(state = ?self.state, "ignoring completion with no request in flight");
            return self.state;
        }

        match outcome {
            Ok(Some(item)) => self.accept(item),
            Ok(None) => {
                tracing::debug!(cursor = ?self.cursor, "feed exhausted");
                self.finish();
            }
            Err(err) => {
                tracing::warn!(cursor = ?self.cursor, error = %err, "next fetch failed; stopping feed");
                self.finish();
            }
        }
        self.state
    }

    pub async fn advance(&mut self, source: &dyn NextSource) -> WalkState {
        let Some(req) = self.on_intersect() else {
            return self.state;
        };
        let outcome = source.fetch_next(req.content_type, req.after_id).await;
        self.complete(outcome)
    }

    fn accept(&mut self, item: FeedItem) {
        let id = item.post.id();
        if item.post.content_type() != self.cursor.content_type {
            tracing::warn!(id, cursor = ?self.cursor, "next item has the wrong content type; stopping feed");
            self.finish();
            return;
        }
        if !self.visited.insert(id) {
            tracing::warn!(id, cursor = ?self.cursor, "next relation revisited an id; stopping feed");
            self.finish();
            return;
        }

        self.cursor.current_id = Some(id);
        self.items.push(item);
        self.state = WalkState::Idle;
    }

    fn finish(&mut self) {
        self.state = WalkState::Finished;
        self.cursor.current_id = None;
    }
}
