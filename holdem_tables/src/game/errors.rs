use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::{Action, Chips, Round, TableId, UserId};

/// Why an action was refused. The table is left untouched whenever one of
/// these is returned.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum ActionRejection {
    #[error("no betting round in progress ({round})")]
    NoBettingRound { round: Round },
    #[error("not your turn")]
    OutOfTurn,
    #[error("already folded")]
    AlreadyFolded,
    #[error("already all-in")]
    AlreadyAllIn,
    #[error("can't check, {owed} to call")]
    CannotCheck { owed: Chips },
    #[error("raise to {target} doesn't exceed the current bet of {current_bet}")]
    RaiseTooSmall { target: Chips, current_bet: Chips },
    #[error("no chips left")]
    NoChips,
}

/// Errors raised by the table state machine.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("table {table_id}: user {user_id} can't {action}: {reason}")]
    InvalidAction {
        table_id: TableId,
        user_id: UserId,
        action: Action,
        reason: ActionRejection,
    },
    #[error("table {0} not found")]
    TableNotFound(TableId),
    #[error("user {user_id} is not seated at table {table_id}")]
    PlayerNotInTable { table_id: TableId, user_id: UserId },
    #[error("user {0} is already seated")]
    AlreadySeated(UserId),
    #[error("table is full ({max_players} seats)")]
    TableFull { max_players: usize },
    #[error("need 2+ players with chips")]
    NotEnoughPlayers,
    #[error("hand already in progress")]
    HandInProgress,
    #[error("deck exhausted: requested {requested}, {remaining} left")]
    DeckExhausted { requested: usize, remaining: usize },
    #[error("table {0} is frozen after an internal error")]
    TableFrozen(TableId),
    #[error("invalid game state: {0}")]
    InvariantViolation(String),
}

impl GameError {
    /// Internal failures that leave the table in a state nobody should
    /// keep mutating.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::DeckExhausted { .. } | Self::InvariantViolation(_)
        )
    }
}

pub type GameResult<T> = Result<T, GameError>;
