//! Errors returned by table actors and the registry.

use thiserror::Error;

use crate::{
    accounts::AccountError,
    db::RepositoryError,
    game::{
        GameError,
        entities::{Chips, TableId, UserId},
    },
};

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Table {0} is closed")]
    TableClosed(TableId),

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: Chips, available: i64 },

    #[error("Invalid table config: {0}")]
    InvalidConfig(String),

    #[error("User {user_id} isn't seated at table {table_id}")]
    NotSeated { table_id: TableId, user_id: UserId },

    #[error("Couldn't return {amount} chips to user {user_id}'s account yet")]
    CashOutPending { user_id: UserId, amount: Chips },
}

impl TableError {
    /// Get a client-safe error message
    ///
    /// Collaborator failures are reported without their internals.
    pub fn client_message(&self) -> String {
        match self {
            TableError::Account(e) => e.client_message(),
            TableError::Repository(_) => "Internal server error".to_string(),
            TableError::Game(e) if e.is_internal() => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether the caller asked for something that doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TableError::Game(GameError::TableNotFound(_) | GameError::PlayerNotInTable { .. })
                | TableError::TableClosed(_)
        )
    }
}

pub type TableResult<T> = Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_internals() {
        let err = TableError::Game(GameError::InvariantViolation("pot 5 != 0".to_string()));
        assert_eq!(err.client_message(), "Internal server error");

        let err = TableError::Game(GameError::NotEnoughPlayers);
        assert_eq!(err.client_message(), "need 2+ players with chips");
    }

    #[test]
    fn test_not_found() {
        assert!(TableError::Game(GameError::TableNotFound(3)).is_not_found());
        assert!(TableError::TableClosed(3).is_not_found());
        assert!(!TableError::InvalidConfig("x".to_string()).is_not_found());
        assert!(
            !TableError::NotSeated {
                table_id: 3,
                user_id: 7
            }
            .is_not_found()
        );
    }
}
