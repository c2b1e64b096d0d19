//! Table configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::{
    GameSettings,
    constants::{MAX_PLAYERS, MIN_PLAYERS},
    entities::{Blinds, Chips},
};

/// Table speed variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSpeed {
    Normal,
    Turbo,
    Hyper,
}

impl std::fmt::Display for TableSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableSpeed::Normal => write!(f, "normal"),
            TableSpeed::Turbo => write!(f, "turbo"),
            TableSpeed::Hyper => write!(f, "hyper"),
        }
    }
}

/// Table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table name
    pub name: String,

    /// Maximum number of players (default: 10)
    pub max_players: usize,

    /// Small blind amount
    pub small_blind: Chips,

    /// Big blind amount
    pub big_blind: Chips,

    /// Most chips a player brings to the table from their balance
    pub max_buy_in: Chips,

    /// Table speed
    pub speed: TableSpeed,

    /// Deal the next hand as soon as one finishes, see
    /// [`GameSettings::auto_start_next_hand`](crate::game::GameSettings)
    pub auto_start_next_hand: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Default Table".to_string(),
            max_players: MAX_PLAYERS,
            small_blind: 5,
            big_blind: 10,
            max_buy_in: 1000,
            speed: TableSpeed::Normal,
            auto_start_next_hand: true,
        }
    }
}

impl TableConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Table name can't be empty".to_string());
        }

        if self.small_blind == 0 {
            return Err("Small blind must be positive".to_string());
        }

        if self.big_blind <= self.small_blind {
            return Err("Big blind must be greater than small blind".to_string());
        }

        if self.max_buy_in < self.big_blind {
            return Err("Max buy-in must cover the big blind".to_string());
        }

        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&self.max_players) {
            return Err(format!(
                "Max players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
            ));
        }

        Ok(())
    }

    /// Rules handed to the game engine
    pub fn settings(&self) -> GameSettings {
        GameSettings {
            blinds: Blinds {
                small: self.small_blind,
                big: self.big_blind,
            },
            max_players: self.max_players,
            auto_start_next_hand: self.auto_start_next_hand,
        }
    }

    /// Get action timeout based on table speed
    pub fn action_timeout_secs(&self) -> u64 {
        match self.speed {
            TableSpeed::Normal => 30,
            TableSpeed::Turbo => 15,
            TableSpeed::Hyper => 5,
        }
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs())
    }
}
