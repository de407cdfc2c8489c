use thiserror::Error;

/// Failures surfaced at component boundaries. Everything below a boundary is `anyhow`.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// Price source unreachable and no snapshot to fall back on.
    #[error("upstream unavailable and no cached snapshot")]
    UpstreamUnavailable,

    /// A required parameter was missing or malformed.
    #[error("bad request: {0}")]
    BadRequest(&'static str),

    /// A proxied upstream answered with a non-success status.
    #[error("upstream error: status {0}")]
    UpstreamStatus(u16),

    /// Network-level failure talking to an upstream.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl EdgeError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}
