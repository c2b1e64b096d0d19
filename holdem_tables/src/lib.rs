//! # Hold'em Tables
//!
//! A multi-table Texas Hold'em engine. Every table is owned by one async
//! actor that validates player actions, runs the hand lifecycle and
//! publishes sanitized snapshots to connected viewers.
//!
//! ## Core Modules
//!
//! - [`game`]: Cards, hand evaluation, the table aggregate, betting and the
//!   hand lifecycle
//! - [`table`]: Table actors, the registry and outbound notifications
//! - [`accounts`]: Balance and statistics contract with in-memory and
//!   Postgres implementations
//! - [`db`]: Connection pooling, timeouts and table persistence
//!
//! ## Example
//!
//! ```
//! use holdem_tables::{Action, GameSettings, Table};
//!
//! let mut table = Table::with_seed(1, GameSettings::new(5, 10, 6), 42);
//! table.seat_player(1, "alice".to_string(), 1000).unwrap();
//! table.seat_player(2, "bob".to_string(), 1000).unwrap();
//! table.start_hand().unwrap();
//!
//! let on_clock = table.user_on_clock().unwrap();
//! table.apply_action(on_clock, Action::Fold).unwrap();
//! assert_eq!(table.last_hand().unwrap().pot, 15);
//! ```

pub mod accounts;
pub mod db;

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    GameError, GameEvent, GameResult, GameSettings, Table,
    constants::{self, MAX_PLAYERS},
    entities::{self, Action, Card, HandSummary, HandValue, TableSnapshot},
    functional,
};

pub mod table;
pub use table::{TableConfig, TableError, TableRegistry, TableServices};
