use thiserror::Error;

/// Core error types for nuget-graph.
///
/// These cover the transport capability shared by every registry consumer:
/// fetching a URL, validating the response and decoding its body.
///
/// # Examples
///
/// ```
/// use nuget_core::error::{NugetError, Result};
///
/// fn require_body(url: &str, body: &[u8]) -> Result<()> {
///     if body.is_empty() {
///         return Err(NugetError::EmptyBody { url: url.into() });
///     }
///     Ok(())
/// }
///
/// assert!(require_body("https://api.nuget.org/v3/index.json", b"").is_err());
/// ```
#[derive(Error, Debug)]
pub enum NugetError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("unsupported URL: {0}")]
    InvalidUrl(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for `Result<T, NugetError>`.
pub type Result<T> = std::result::Result<T, NugetError>;
