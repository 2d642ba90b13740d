//! Failure types used inside the gateway core.
//!
//! Expected upstream failures travel as [`UpstreamResult`](super::upstream::UpstreamResult)
//! values; `GatewayError` only appears where a pipeline step needs `?`.

use thiserror::Error;

pub const NOT_CONFIGURED_MESSAGE: &str = "Seerr URL is not configured";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No upstream base address was supplied by the caller.
    #[error("{NOT_CONFIGURED_MESSAGE}")]
    NotConfigured,

    /// Upstream answered with a failure, or could not be reached (`status` is `None`).
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    /// HTTP status the dispatcher reports for this error.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::NotConfigured => 400,
            GatewayError::Upstream { status, .. } => status.unwrap_or(502),
            GatewayError::Client(_) | GatewayError::Serialization(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
