use thiserror::Error;

/// Reasons a header sniff could not classify a resource.
///
/// None of these are fatal to callers: every variant means "inconclusive".
#[derive(Debug, Error)]
pub enum SniffError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("Header truncated: got {len} bytes")]
    Truncated { len: usize },

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),
}
