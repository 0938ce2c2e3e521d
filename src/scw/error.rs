//! Scaleway API error types

use reqwest::StatusCode;
use thiserror::Error;

use super::locality::LocalityError;

/// Errors raised while talking to the Scaleway API
#[derive(Error, Debug)]
pub enum ScwError {
    #[error("scaleway API error {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("timeout after {seconds}s waiting for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("{what} reached failure state: {status}")]
    FailureState { what: String, status: String },

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error(transparent)]
    Locality(#[from] LocalityError),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ScwError {
    /// HTTP status carried by this error, if it came from the API
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ScwError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, ScwError>;

/// Check whether an error chain contains an HTTP 404 from the API.
///
/// The provider layer works with `anyhow::Error`, so the vendor error may be
/// wrapped in any number of contexts.
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ScwError>())
        .any(ScwError::is_not_found)
}
