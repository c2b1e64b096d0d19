//! Table actor message types.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{config::TableSpeed, errors::TableResult};
use crate::game::entities::{Action, Chips, PlayerTableView, Round, SeatIndex, TableId, UserId};

/// Messages that can be sent to a TableActor
#[derive(Debug)]
pub enum TableMessage {
    /// Seat a user, moving the buy-in out of their account balance
    Join {
        user_id: UserId,
        response: oneshot::Sender<TableResult<SeatIndex>>,
    },

    /// Leave the table; answers with the number of players still seated
    Leave {
        user_id: UserId,
        response: oneshot::Sender<TableResult<usize>>,
    },

    /// Deal a new hand; only a seated player may ask
    StartHand {
        user_id: UserId,
        response: oneshot::Sender<TableResult<()>>,
    },

    /// Player action (fold, check, call, raise, all-in)
    TakeAction {
        user_id: UserId,
        action: Action,
        response: oneshot::Sender<TableResult<()>>,
    },

    /// Snapshot plus the user's own hole cards
    GetPlayerView {
        user_id: UserId,
        response: oneshot::Sender<TableResult<PlayerTableView>>,
    },

    /// Close the table for good
    Close {
        response: oneshot::Sender<TableResult<()>>,
    },
}

/// Table listing entry for discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table_id: TableId,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub max_buy_in: Chips,
    pub speed: TableSpeed,
    pub round: Round,
    pub hand_number: u64,
}
