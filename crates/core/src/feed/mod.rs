//! Infinite reading feed: the server-side "next" composition and the cursor walker that
//! consumes it.

pub mod client;
pub mod service;
pub mod walker;

pub use client::HttpNextSource;
pub use service::{FeedService, NextResponse};
pub use walker::{FeedCursor, FeedWalker, NextRequest, NextSource, WalkState};
