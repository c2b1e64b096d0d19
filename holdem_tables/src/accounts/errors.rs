//! Account error types.

use thiserror::Error;

use crate::{db::timeouts::TimeoutError, game::entities::UserId};

/// Account service errors
#[derive(Debug, Error)]
pub enum AccountError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No account for this user id
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// No account for this email
    #[error("No user with email {0}")]
    EmailNotFound(String),

    /// The adjustment would take the balance below zero
    #[error("Insufficient balance for user {user_id}: available {available}, required {required}")]
    InsufficientBalance {
        user_id: UserId,
        available: i64,
        required: i64,
    },

    /// Duplicate transaction (idempotency key already used)
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Balance would overflow
    #[error("Balance overflow")]
    BalanceOverflow,

    /// The service didn't answer in time
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl AccountError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized to prevent information disclosure about
    /// the internal system structure, and user IDs and emails are redacted.
    pub fn client_message(&self) -> String {
        match self {
            AccountError::Database(_) | AccountError::Timeout(_) => {
                "Internal server error".to_string()
            }
            AccountError::UserNotFound(_) | AccountError::EmailNotFound(_) => {
                "User not found".to_string()
            }
            AccountError::InsufficientBalance { .. } => "Insufficient balance".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_ids() {
        let err = AccountError::UserNotFound(42);
        assert_eq!(err.client_message(), "User not found");
        let err = AccountError::InsufficientBalance {
            user_id: 42,
            available: 5,
            required: 10,
        };
        assert!(!err.client_message().contains("42"));
    }

    #[test]
    fn test_duplicate_transaction_message() {
        let err = AccountError::DuplicateTransaction("key-1".to_string());
        assert_eq!(err.client_message(), "Duplicate transaction: key-1");
    }
}
