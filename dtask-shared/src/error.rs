/// Domain error taxonomy
///
/// Every service operation returns [`MarketResult`]. The API layer maps each
/// variant to an HTTP status; the message is meant to be shown to the user
/// as-is, except for [`MarketError::Store`] and [`MarketError::Internal`]
/// whose details are only logged.

use crate::auth::password::PasswordError;
use crate::store::StoreError;

/// Result alias used by the service layer
pub type MarketResult<T> = Result<T, MarketError>;

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation (duplicate email, wallet/role, application)
    #[error("{0}")]
    Conflict(String),

    /// Missing, invalid or expired credential, or bad password
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to act on this resource
    #[error("{0}")]
    Forbidden(String),

    /// No such user, task or applicant
    #[error("{0}")]
    NotFound(String),

    /// Underlying persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Unexpected failure outside the store (hashing, signing, join errors)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MarketError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        MarketError::NotFound(msg.into())
    }
}

impl From<PasswordError> for MarketError {
    fn from(err: PasswordError) -> Self {
        MarketError::Internal(format!("Password operation failed: {}", err))
    }
}

impl From<tokio::task::JoinError> for MarketError {
    fn from(err: tokio::task::JoinError) -> Self {
        MarketError::Internal(format!("Blocking task failed: {}", err))
    }
}
