use thiserror::Error;

use crate::store::{StoreError, UniqueField};
use crate::token::TokenError;

/// Business errors for identity and catalog workflows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed on {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("{field} already exists")]
    Conflict { field: UniqueField },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("hashing error: {0}")]
    Hash(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }

    /// Stable numeric code for external mapping/logging.
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation { .. } => 1001,
            ServiceError::Conflict { .. } => 1002,
            ServiceError::NotFound(_) => 1003,
            ServiceError::Unauthorized => 1004,
            ServiceError::Hash(_) => 1101,
            ServiceError::Token(_) => 1102,
            ServiceError::Store(_) => 1200,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            // A storage-level unique violation is the same domain conflict as
            // the service-level pre-check catching it first.
            StoreError::Conflict(field) => ServiceError::Conflict { field },
            other => ServiceError::Store(other),
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(e: TokenError) -> Self {
        match e {
            // A token that fails validation is an authorization failure,
            // indistinguishable in kind from bad credentials.
            TokenError::Invalid | TokenError::Expired => ServiceError::Unauthorized,
            TokenError::Encode(msg) => ServiceError::Token(msg),
        }
    }
}
