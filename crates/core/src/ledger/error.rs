//! Ledger error types.
//!
//! Validation and resolution errors are returned to the caller as 4xx-class
//! failures. `StorageUnavailable` covers everything the store could not
//! complete, including timeouts and aborted units of work.

use banka_shared::{AccountId, AppError, Money, UserId};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount must be strictly positive.
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Money),

    /// Source and destination are the same account or the same user handle.
    #[error("Cannot transfer to the same account")]
    SelfTransfer,

    // ========== Balance Errors ==========
    /// Source balance is below the requested amount.
    #[error("Insufficient funds in account {account_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// The source account.
        account_id: AccountId,
        /// Amount the caller tried to move.
        requested: Money,
        /// Balance at check time.
        available: Money,
    },

    // ========== Lookup Errors ==========
    /// No matching account, or the caller does not own it.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The user owns no account to act as default.
    #[error("User {0} has no account")]
    DefaultAccountMissing(UserId),

    /// No user with this handle.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Caller is authenticated but may not act for this identity.
    #[error("Access denied: {0}")]
    Forbidden(String),

    // ========== Storage Errors ==========
    /// Store transport or transaction failure, or the operation timed out.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::SelfTransfer => "SELF_TRANSFER",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AccountNotFound(_) | Self::DefaultAccountMissing(_) => "ACCOUNT_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidAmount(_) | Self::SelfTransfer => 400,

            // 403 Forbidden
            Self::Forbidden(_) => 403,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::DefaultAccountMissing(_) | Self::UserNotFound(_) => {
                404
            }

            // 422 Unprocessable - business rule
            Self::InsufficientFunds { .. } => 422,

            // 503 Service Unavailable
            Self::StorageUnavailable(_) => 503,
        }
    }

    /// Returns true if the failure originated in the store rather than the request.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::InvalidAmount(_) | LedgerError::SelfTransfer => Self::Validation(message),
            LedgerError::InsufficientFunds { .. } => Self::BusinessRule(message),
            LedgerError::AccountNotFound(_)
            | LedgerError::DefaultAccountMissing(_)
            | LedgerError::UserNotFound(_) => Self::NotFound(message),
            LedgerError::Forbidden(_) => Self::Forbidden(message),
            LedgerError::StorageUnavailable(_) => Self::Unavailable(message),
        }
    }
}
