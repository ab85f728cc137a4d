//! Error types for the provider clients.

use thiserror::Error;

/// Errors that can occur when talking to a remote provider.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint reported that the resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The endpoint answered successfully but reported a failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// A request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Shorten a response body for inclusion in an error message.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
