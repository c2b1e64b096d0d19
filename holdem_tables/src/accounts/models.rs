//! Account data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::entities::UserId;

/// A player's persistent account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub balance: i64,
    pub games_played: i64,
    pub games_won: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One balance change, keyed for idempotency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    pub user_id: UserId,
    pub delta: i64,
    pub balance_after: i64,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}
