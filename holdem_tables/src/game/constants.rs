//! Table-wide limits.

/// Cards in a standard deck.
pub const DECK_SIZE: usize = 52;

/// Hole cards dealt to each player.
pub const HOLE_CARDS: usize = 2;

/// Community cards on a complete board.
pub const BOARD_SIZE: usize = 5;

/// Seats at a single table. A full ten-handed deal plus a complete board
/// still leaves 27 cards in the deck.
pub const MAX_PLAYERS: usize = 10;

/// A hand needs at least two funded players.
pub const MIN_PLAYERS: usize = 2;
