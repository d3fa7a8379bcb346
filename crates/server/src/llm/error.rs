//! Error types for the model API client.

use thiserror::Error;

/// Errors that can occur when talking to the model API.
///
/// Everything here is an upstream failure: the turn could not be completed
/// and the caller reports it as such. Tool-level failures never appear here;
/// they are rendered into the response text instead.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The HTTP request itself failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error body.
    #[error("upstream {error_type}: {message}")]
    Api { error_type: String, message: String },

    /// Rate limited; the value is the advertised retry delay.
    #[error("rate limited; retry in {0}s")]
    RateLimited(u64),

    /// The API rejected the credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A response or event could not be decoded.
    #[error("malformed response: {0}")]
    Parse(String),

    /// The event stream broke mid-turn.
    #[error("stream dropped: {0}")]
    Stream(String),
}

/// Error body shape returned by the API on non-success statuses.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// Outer discriminator, always `"error"`.
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: ApiErrorDetail,
}

/// The nested `error` object of an [`ApiErrorResponse`].
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
