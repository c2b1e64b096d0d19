//! Hold'em game engine.
//!
//! This module provides the authoritative model of a single table:
//! - Cards, the single-use deck and hand evaluation
//! - The [`Table`] aggregate with seating and turn rotation
//! - The betting-round engine and the hand lifecycle (deal, streets,
//!   showdown, side pots)
//! - Sanitized snapshots and the events a table emits

// Submodules
pub mod betting;
pub mod constants;
pub mod entities;
pub mod errors;
pub mod functional;
pub mod lifecycle;
pub mod state_machine;

pub use errors::{ActionRejection, GameError, GameResult};
pub use lifecycle::SidePot;
pub use state_machine::{ClockKey, GameEvent, GameSettings, SeatedPlayer, Table};
