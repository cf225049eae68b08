//! Session errors

use shelfdesk_gateway::RequestError;
use thiserror::Error;

/// Why a credential could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed credential: expected 3 segments, found {0}")]
    Malformed(usize),

    #[error("Credential payload is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Credential payload is not JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Credential payload is not a JSON object")]
    NotAnObject,

    #[error("Credential has no exp claim")]
    MissingExpiry,

    #[error("Credential exp claim is not a valid timestamp")]
    InvalidExpiry,
}

/// Session controller errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// Login rejected; never retried automatically
    #[error("Authentication failed")]
    AuthFailure,

    /// The backend no longer accepts the stored credential
    #[error("Session is no longer authorized")]
    Unauthorized,

    #[error("Session renewal failed: {0}")]
    RenewalFailure(String),

    #[error("No authenticated session")]
    NotAuthenticated,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Credential storage failed: {0}")]
    Storage(#[from] shelfdesk_common::Error),
}

impl SessionError {
    /// Get error code for logging
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::AuthFailure => "AUTH_FAILURE",
            SessionError::Unauthorized => "UNAUTHORIZED",
            SessionError::RenewalFailure(_) => "RENEWAL_FAILURE",
            SessionError::NotAuthenticated => "NOT_AUTHENTICATED",
            SessionError::Decode(_) => "MALFORMED_CREDENTIAL",
            SessionError::Request(_) => "REQUEST_FAILED",
            SessionError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
