//! Gateway error taxonomy and the transport status message table.

use crate::session::api::RefreshFailure;

/// Fixed user-facing message for a non-2xx transport status.
#[must_use]
pub fn status_message(status: u16) -> &'static str {
    match status {
        400 => "The request was malformed",
        401 => "Please sign in again",
        403 => "You do not have permission to do that",
        404 => "The requested resource was not found",
        408 => "The request timed out",
        409 => "The request conflicted with existing data",
        429 => "Too many requests, please slow down",
        500 => "The server hit an internal error",
        502 => "Bad gateway response from upstream",
        503 => "The service is temporarily unavailable",
        504 => "The upstream service timed out",
        _ => "The request failed, please try again",
    }
}

/// Network-level failures: the request never produced a usable envelope.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{}", status_message(*.status))]
    Status { status: u16 },
}

/// Anything a gateway call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Token refresh was attempted and failed; the role has been logged out.
    #[error(transparent)]
    Refresh(#[from] RefreshFailure),

    /// The backend answered with a non-success application code.
    #[error("{message}")]
    Business { code: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response was not the expected JSON envelope — typically an HTML
    /// error page from a misconfigured proxy.
    #[error("unexpected non-JSON response: {0}")]
    Configuration(String),

    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
