use chrono::{DateTime, Utc};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{constants::DECK_SIZE, errors::GameError};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Spade, Suit::Diamond, Suit::Heart];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card values.
pub type Value = u8;

/// Highest card value. Aces only count as 1 inside a wheel straight.
pub const ACE: Value = 14;

/// A card is a tuple of a value (2u8 ... ace=14u8) and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            1 | 14 => "A",
            11 => "J",
            12 => "Q",
            13 => "K",
            v => &v.to_string(),
        };
        write!(f, "{value}{}", self.1)
    }
}

/// Hand categories, weakest first.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "high card",
            Self::OnePair => "one pair",
            Self::TwoPair => "two pair",
            Self::ThreeOfAKind => "three of a kind",
            Self::Straight => "straight",
            Self::Flush => "flush",
            Self::FullHouse => "full house",
            Self::FourOfAKind => "four of a kind",
            Self::StraightFlush => "straight flush",
            Self::RoyalFlush => "royal flush",
        };
        write!(f, "{repr}")
    }
}

/// The comparable strength of a player's best five cards. Ordering is by
/// category first, then by `values` lexicographically (the cards that
/// define the category followed by kickers).
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandValue {
    pub rank: Rank,
    pub values: Vec<Value>,
}

impl fmt::Display for HandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.rank, self.values)
    }
}

/// A single-use deck. Shuffled once, then dealt from a monotonic cursor so
/// no card can come out twice.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
    deck_idx: usize,
}

impl Deck {
    fn ordered() -> Vec<Card> {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for suit in Suit::ALL {
            for value in 2..=ACE {
                cards.push(Card(value, suit));
            }
        }
        cards
    }

    #[must_use]
    pub fn new_shuffled() -> Self {
        Self::shuffled_with(&mut rand::rng())
    }

    pub fn shuffled_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut cards = Self::ordered();
        cards.shuffle(rng);
        Self { cards, deck_idx: 0 }
    }

    pub fn draw(&mut self, n: usize) -> Result<Vec<Card>, GameError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(GameError::DeckExhausted {
                requested: n,
                remaining,
            });
        }
        let cards = self.cards[self.deck_idx..self.deck_idx + n].to_vec();
        self.deck_idx += n;
        Ok(cards)
    }

    pub fn deal_card(&mut self) -> Result<Card, GameError> {
        let card = self
            .cards
            .get(self.deck_idx)
            .copied()
            .ok_or(GameError::DeckExhausted {
                requested: 1,
                remaining: 0,
            })?;
        self.deck_idx += 1;
        Ok(card)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len() - self.deck_idx
    }

    /// Cards already handed out from this deck, in deal order.
    #[must_use]
    pub fn dealt(&self) -> &[Card] {
        &self.cards[..self.deck_idx]
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new_shuffled()
    }
}

/// Whole chips. Stacks and bets are never fractional.
pub type Chips = u64;

/// External user identity.
pub type UserId = i64;

pub type TableId = i64;

/// Type alias for seat positions during the game.
pub type SeatIndex = usize;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.small, self.big)
    }
}

/// A player's decision on their turn. `Raise` carries the total the player
/// is raising *to* for this street, not the increment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum Action {
    Fold,
    Check,
    Call,
    Raise(Chips),
    AllIn,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fold => write!(f, "fold"),
            Self::Check => write!(f, "check"),
            Self::Call => write!(f, "call"),
            Self::Raise(amount) => write!(f, "raise to {amount}"),
            Self::AllIn => write!(f, "go all-in"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    #[default]
    Waiting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Finished,
}

impl Round {
    /// Whether players take actions during this round.
    #[must_use]
    pub fn is_betting(self) -> bool {
        matches!(self, Self::Preflop | Self::Flop | Self::Turn | Self::River)
    }

    /// The street that follows this one and how many community cards it
    /// reveals. The river is followed by the showdown, which deals nothing.
    #[must_use]
    pub fn next_street(self) -> Option<(Round, usize)> {
        match self {
            Self::Preflop => Some((Self::Flop, 3)),
            Self::Flop => Some((Self::Turn, 1)),
            Self::Turn => Some((Self::River, 1)),
            Self::River => Some((Self::Showdown, 0)),
            Self::Waiting | Self::Showdown | Self::Finished => None,
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Preflop => "pre-flop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
            Self::Finished => "finished",
        };
        write!(f, "{repr}")
    }
}

/// For users seated at a table.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    // Seated but not dealt into the current hand.
    SitOut,
    // In the hand and has not acted since the last raise.
    Wait,
    Check,
    Call,
    Raise,
    // Whole stack committed; no further decisions this hand.
    AllIn,
    Fold,
}

impl PlayerState {
    /// Whether the player may still be asked to act this hand.
    #[must_use]
    pub fn can_act(self) -> bool {
        matches!(self, Self::Wait | Self::Check | Self::Call | Self::Raise)
    }

    /// Whether the player still contests the pot.
    #[must_use]
    pub fn in_hand(self) -> bool {
        !matches!(self, Self::SitOut | Self::Fold)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::SitOut => "sitting out",
            Self::Wait => "waiting",
            Self::Check => "check",
            Self::Call => "call",
            Self::Raise => "raise",
            Self::AllIn => "all-in",
            Self::Fold => "folded",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub user_id: UserId,
    pub name: String,
    pub seat_idx: SeatIndex,
    pub stack: Chips,
    /// Chips put in during the current street.
    pub current_bet: Chips,
    /// Chips put in during the whole hand.
    pub contributed: Chips,
    pub state: PlayerState,
    pub cards: Vec<Card>,
}

impl Player {
    #[must_use]
    pub fn new(user_id: UserId, name: String, seat_idx: SeatIndex, stack: Chips) -> Self {
        Self {
            user_id,
            name,
            seat_idx,
            stack,
            current_bet: 0,
            contributed: 0,
            state: PlayerState::SitOut,
            cards: Vec::with_capacity(2),
        }
    }

    pub fn reset(&mut self) {
        self.current_bet = 0;
        self.contributed = 0;
        self.cards.clear();
        self.state = if self.stack > 0 {
            PlayerState::Wait
        } else {
            PlayerState::SitOut
        };
    }

    /// Move up to `chips` from the stack into the pot. Returns what was
    /// actually moved; an emptied stack puts the player all-in.
    pub fn commit(&mut self, chips: Chips) -> Chips {
        let moved = chips.min(self.stack);
        self.stack -= moved;
        self.current_bet += moved;
        self.contributed += moved;
        if self.stack == 0 && self.state.in_hand() {
            self.state = PlayerState::AllIn;
        }
        moved
    }

    #[must_use]
    pub fn to_call(&self, current_bet: Chips) -> Chips {
        current_bet.saturating_sub(self.current_bet)
    }
}

/// What kind of chip movement an audit record describes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BetKind {
    SmallBlind,
    BigBlind,
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
}

impl fmt::Display for BetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::SmallBlind => "small_blind",
            Self::BigBlind => "big_blind",
            Self::Fold => "fold",
            Self::Check => "check",
            Self::Call => "call",
            Self::Raise => "raise",
            Self::AllIn => "all_in",
        };
        write!(f, "{repr}")
    }
}

/// Append-only audit entry for every blind and action.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BetRecord {
    pub table_id: TableId,
    pub user_id: UserId,
    pub hand_number: u64,
    pub round: Round,
    pub kind: BetKind,
    pub amount: Chips,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ShowdownHand {
    pub user_id: UserId,
    pub seat_idx: SeatIndex,
    pub cards: Vec<Card>,
    pub value: HandValue,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Payout {
    /// 0 is the main pot, side pots follow in order of contribution level.
    pub pot_idx: usize,
    pub user_id: UserId,
    pub seat_idx: SeatIndex,
    pub amount: Chips,
}

/// Per-player money movement for one hand.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerResult {
    pub user_id: UserId,
    pub contributed: Chips,
    pub won: Chips,
}

impl PlayerResult {
    #[must_use]
    pub fn net(&self) -> i64 {
        self.won as i64 - self.contributed as i64
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct HandSummary {
    pub hand_number: u64,
    pub board: Vec<Card>,
    pub pot: Chips,
    /// True when everyone else folded and no cards were shown.
    pub uncontested: bool,
    pub showdown: Vec<ShowdownHand>,
    pub payouts: Vec<Payout>,
    pub results: Vec<PlayerResult>,
}

impl HandSummary {
    #[must_use]
    pub fn payout_for(&self, user_id: UserId) -> Chips {
        self.payouts
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.amount)
            .sum()
    }
}

/// Public view of a seat. Hole cards are never part of it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerView {
    pub user_id: UserId,
    pub name: String,
    pub seat_idx: SeatIndex,
    pub stack: Chips,
    pub current_bet: Chips,
    pub state: PlayerState,
    pub has_cards: bool,
}

/// Everything a viewer of the table may see.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableSnapshot {
    pub table_id: TableId,
    pub round: Round,
    pub hand_number: u64,
    pub dealer_idx: SeatIndex,
    pub small_blind_idx: Option<SeatIndex>,
    pub big_blind_idx: Option<SeatIndex>,
    pub player_on_clock: Option<SeatIndex>,
    pub current_bet: Chips,
    pub pot: Chips,
    pub blinds: Blinds,
    pub board: Vec<Card>,
    pub players: Vec<PlayerView>,
    pub frozen: bool,
    pub last_hand: Option<HandSummary>,
}

/// A snapshot plus the requesting player's own hole cards.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerTableView {
    pub snapshot: TableSnapshot,
    pub seat_idx: SeatIndex,
    pub hole_cards: Vec<Card>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    #[test]
    fn test_deck_holds_52_unique_cards() {
        let mut deck = Deck::new_shuffled();
        let cards = deck.draw(DECK_SIZE).unwrap();
        let unique: HashSet<_> = cards.iter().collect();
        assert_eq!(unique.len(), DECK_SIZE);
        assert!(cards.iter().all(|c| (2..=ACE).contains(&c.0)));
    }

    #[test]
    fn test_deck_draw_advances_cursor() {
        let mut deck = Deck::new_shuffled();
        let first = deck.draw(3).unwrap();
        let second = deck.deal_card().unwrap();
        assert_eq!(deck.remaining(), DECK_SIZE - 4);
        assert_eq!(deck.dealt().len(), 4);
        assert!(!first.contains(&second));
    }

    #[test]
    fn test_deck_exhausted() {
        let mut deck = Deck::new_shuffled();
        deck.draw(50).unwrap();
        let err = deck.draw(3).unwrap_err();
        assert_eq!(
            err,
            GameError::DeckExhausted {
                requested: 3,
                remaining: 2
            }
        );
        deck.draw(2).unwrap();
        assert!(deck.deal_card().is_err());
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let mut a = Deck::shuffled_with(&mut StdRng::seed_from_u64(7));
        let mut b = Deck::shuffled_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.draw(10).unwrap(), b.draw(10).unwrap());
    }

    #[test]
    fn test_card_display() {
        assert_eq!(Card(14, Suit::Spade).to_string(), "A♠");
        assert_eq!(Card(10, Suit::Heart).to_string(), "10♥");
        assert_eq!(Card(12, Suit::Diamond).to_string(), "Q♦");
    }

    #[test]
    fn test_hand_value_orders_by_rank_then_values() {
        let two_pair = HandValue {
            rank: Rank::TwoPair,
            values: vec![5, 5, 4, 4, 3],
        };
        let aces = HandValue {
            rank: Rank::OnePair,
            values: vec![14, 14, 13, 12, 11],
        };
        let kings = HandValue {
            rank: Rank::OnePair,
            values: vec![13, 13, 12, 11, 10],
        };
        assert!(two_pair > aces);
        assert!(aces > kings);
    }

    #[test]
    fn test_round_street_progression() {
        assert_eq!(Round::Preflop.next_street(), Some((Round::Flop, 3)));
        assert_eq!(Round::Flop.next_street(), Some((Round::Turn, 1)));
        assert_eq!(Round::Turn.next_street(), Some((Round::River, 1)));
        assert_eq!(Round::River.next_street(), Some((Round::Showdown, 0)));
        assert_eq!(Round::Waiting.next_street(), None);
        assert!(!Round::Waiting.is_betting());
        assert!(Round::River.is_betting());
    }

    #[test]
    fn test_player_commit_caps_at_stack() {
        let mut player = Player::new(1, "alice".to_string(), 0, 30);
        player.reset();
        assert_eq!(player.commit(10), 10);
        assert_eq!(player.state, PlayerState::Wait);
        assert_eq!(player.commit(50), 20);
        assert_eq!(player.stack, 0);
        assert_eq!(player.current_bet, 30);
        assert_eq!(player.contributed, 30);
        assert_eq!(player.state, PlayerState::AllIn);
    }

    #[test]
    fn test_busted_player_sits_out_on_reset() {
        let mut player = Player::new(1, "bob".to_string(), 0, 0);
        player.reset();
        assert_eq!(player.state, PlayerState::SitOut);
    }

    #[test]
    fn test_action_serde_shape() {
        let json = serde_json::to_string(&Action::Raise(40)).unwrap();
        assert_eq!(json, r#"{"type":"raise","amount":40}"#);
        let parsed: Action = serde_json::from_str(r#"{"type":"fold"}"#).unwrap();
        assert_eq!(parsed, Action::Fold);
    }

    #[test]
    fn test_player_result_net() {
        let result = PlayerResult {
            user_id: 1,
            contributed: 40,
            won: 100,
        };
        assert_eq!(result.net(), 60);
    }
}
