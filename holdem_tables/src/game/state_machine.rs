//! The table aggregate.
//!
//! A [`Table`] owns every piece of per-hand state: seats, stacks, the deck,
//! the board and whose turn it is. It is mutated by a single owner (the
//! table actor) through the betting engine in `betting.rs` and the hand
//! lifecycle in `lifecycle.rs`, and read through sanitized snapshots.

use chrono::Utc;
use log::error;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashSet, VecDeque},
    fmt,
};

use super::{
    constants::{BOARD_SIZE, MAX_PLAYERS},
    entities::{
        Action, BetKind, BetRecord, Blinds, Card, Chips, Deck, HandSummary, Player, PlayerState,
        PlayerTableView, PlayerView, Round, SeatIndex, TableId, TableSnapshot, UserId,
    },
    errors::{GameError, GameResult},
};

/// Static rules of a table.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameSettings {
    pub blinds: Blinds,
    pub max_players: usize,
    /// Deal again as soon as a hand finishes while at least two players
    /// have chips. A hand in which nobody acted (the blinds put everyone
    /// all-in) never chains into the next one on its own. Turn-timer
    /// actions count as acting, so an idle table keeps dealing until its
    /// players run out of chips or leave.
    pub auto_start_next_hand: bool,
}

impl GameSettings {
    #[must_use]
    pub fn new(small_blind: Chips, big_blind: Chips, max_players: usize) -> Self {
        Self {
            blinds: Blinds {
                small: small_blind,
                big: big_blind,
            },
            max_players: max_players.min(MAX_PLAYERS),
            auto_start_next_hand: false,
        }
    }
}

/// Events that occur during gameplay, drained by the table's owner after
/// every command.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum GameEvent {
    Joined {
        user_id: UserId,
        seat_idx: SeatIndex,
    },
    LeaveQueued {
        user_id: UserId,
    },
    /// The seat is free; `stack` is what the player takes with them.
    Left {
        user_id: UserId,
        stack: Chips,
    },
    HandStarted {
        hand_number: u64,
        dealer_idx: SeatIndex,
    },
    BlindPosted {
        user_id: UserId,
        kind: BetKind,
        amount: Chips,
    },
    Action {
        user_id: UserId,
        action: Action,
        amount: Chips,
    },
    StreetDealt {
        round: Round,
        cards: Vec<Card>,
    },
    HandFinished(Box<HandSummary>),
    Frozen {
        reason: String,
    },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined { user_id, seat_idx } => {
                write!(f, "user {user_id} sat down in seat {seat_idx}")
            }
            Self::LeaveQueued { user_id } => {
                write!(f, "user {user_id} will leave after this hand")
            }
            Self::Left { user_id, stack } => {
                write!(f, "user {user_id} left the table with {stack} chips")
            }
            Self::HandStarted {
                hand_number,
                dealer_idx,
            } => write!(f, "hand #{hand_number} started, dealer in seat {dealer_idx}"),
            Self::BlindPosted {
                user_id,
                kind,
                amount,
            } => write!(f, "user {user_id} posted {kind} of {amount}"),
            Self::Action {
                user_id,
                action,
                amount,
            } => write!(f, "user {user_id} chose to {action} ({amount} chips)"),
            Self::StreetDealt { round, cards } => {
                let cards = cards
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "{round}: {cards}")
            }
            Self::HandFinished(summary) => {
                write!(
                    f,
                    "hand #{} finished, pot of {}",
                    summary.hand_number, summary.pot
                )
            }
            Self::Frozen { reason } => write!(f, "table frozen: {reason}"),
        }
    }
}

/// Identity of a single turn. Any change to the hand, street, seat or
/// action sequence produces a different key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ClockKey {
    pub table_id: TableId,
    pub hand_number: u64,
    pub round: Round,
    pub seat: SeatIndex,
    pub action_seq: u64,
}

/// Between-hands view of a seat, enough to rebuild a table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SeatedPlayer {
    pub user_id: UserId,
    pub name: String,
    pub stack: Chips,
}

#[derive(Debug)]
pub struct Table {
    pub(super) table_id: TableId,
    pub(super) settings: GameSettings,
    pub(super) players: Vec<Player>,
    pub(super) dealer_idx: SeatIndex,
    pub(super) small_blind_idx: Option<SeatIndex>,
    pub(super) big_blind_idx: Option<SeatIndex>,
    pub(super) current_bet: Chips,
    pub(super) pot: Chips,
    pub(super) round: Round,
    pub(super) player_on_clock: Option<SeatIndex>,
    pub(super) board: Vec<Card>,
    pub(super) deck: Option<Deck>,
    pub(super) hand_number: u64,
    pub(super) action_seq: u64,
    /// Voluntary actions taken in the current hand.
    pub(super) hand_actions: u32,
    pub(super) frozen: bool,
    pub(super) last_hand: Option<HandSummary>,
    pub(super) pending_removal: Vec<UserId>,
    pub(super) events: VecDeque<GameEvent>,
    pub(super) bets: Vec<BetRecord>,
    pub(super) rng: StdRng,
}

impl Table {
    #[must_use]
    pub fn new(table_id: TableId, settings: GameSettings) -> Self {
        Self::with_rng(table_id, settings, StdRng::from_rng(&mut rand::rng()))
    }

    /// A table whose shuffles are reproducible.
    #[must_use]
    pub fn with_seed(table_id: TableId, settings: GameSettings, seed: u64) -> Self {
        Self::with_rng(table_id, settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(table_id: TableId, settings: GameSettings, rng: StdRng) -> Self {
        Self {
            table_id,
            settings,
            players: Vec::with_capacity(settings.max_players),
            dealer_idx: 0,
            small_blind_idx: None,
            big_blind_idx: None,
            current_bet: 0,
            pot: 0,
            round: Round::Waiting,
            player_on_clock: None,
            board: Vec::with_capacity(BOARD_SIZE),
            deck: None,
            hand_number: 0,
            action_seq: 0,
            hand_actions: 0,
            frozen: false,
            last_hand: None,
            pending_removal: Vec::new(),
            events: VecDeque::new(),
            bets: Vec::new(),
            rng,
        }
    }

    /// Rebuild a table between hands from persisted seats.
    #[must_use]
    pub fn restore(
        table_id: TableId,
        settings: GameSettings,
        seats: Vec<SeatedPlayer>,
        dealer_idx: SeatIndex,
        hand_number: u64,
    ) -> Self {
        let mut table = Self::new(table_id, settings);
        for (seat_idx, seat) in seats.into_iter().take(settings.max_players).enumerate() {
            let mut player = Player::new(seat.user_id, seat.name, seat_idx, seat.stack);
            player.reset();
            table.players.push(player);
        }
        table.dealer_idx = if table.players.is_empty() {
            0
        } else {
            dealer_idx % table.players.len()
        };
        table.hand_number = hand_number;
        table
    }

    // === Accessors ===

    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[must_use]
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    #[must_use]
    pub fn round(&self) -> Round {
        self.round
    }

    #[must_use]
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }

    #[must_use]
    pub fn dealer_idx(&self) -> SeatIndex {
        self.dealer_idx
    }

    #[must_use]
    pub fn pot(&self) -> Chips {
        self.pot
    }

    #[must_use]
    pub fn current_bet(&self) -> Chips {
        self.current_bet
    }

    #[must_use]
    pub fn board(&self) -> &[Card] {
        &self.board
    }

    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[must_use]
    pub fn player(&self, user_id: UserId) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    #[must_use]
    pub fn player_on_clock(&self) -> Option<SeatIndex> {
        self.player_on_clock
    }

    /// The user whose turn it is, if any.
    #[must_use]
    pub fn user_on_clock(&self) -> Option<UserId> {
        self.player_on_clock
            .and_then(|idx| self.players.get(idx))
            .map(|p| p.user_id)
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    #[must_use]
    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn is_hand_in_progress(&self) -> bool {
        self.round.is_betting() || self.round == Round::Showdown
    }

    #[must_use]
    pub fn last_hand(&self) -> Option<&HandSummary> {
        self.last_hand.as_ref()
    }

    /// Players with chips in front of them.
    #[must_use]
    pub fn funded_players(&self) -> usize {
        self.players.iter().filter(|p| p.stack > 0).count()
    }

    #[must_use]
    pub fn clock_key(&self) -> Option<ClockKey> {
        self.player_on_clock.map(|seat| ClockKey {
            table_id: self.table_id,
            hand_number: self.hand_number,
            round: self.round,
            seat,
            action_seq: self.action_seq,
        })
    }

    /// Seats as they stand at the start of the current hand, without
    /// players queued to leave.
    #[must_use]
    pub fn seats(&self) -> Vec<SeatedPlayer> {
        self.players
            .iter()
            .filter(|p| !self.pending_removal.contains(&p.user_id))
            .map(|p| SeatedPlayer {
                user_id: p.user_id,
                name: p.name.clone(),
                stack: p.stack + p.contributed,
            })
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    pub fn drain_bets(&mut self) -> Vec<BetRecord> {
        std::mem::take(&mut self.bets)
    }

    // === Seating ===

    /// Seat a player. Joining mid-hand sits the player out until the next
    /// deal.
    pub fn seat_player(
        &mut self,
        user_id: UserId,
        name: String,
        stack: Chips,
    ) -> GameResult<SeatIndex> {
        self.ensure_not_frozen()?;
        if self.player(user_id).is_some() {
            return Err(GameError::AlreadySeated(user_id));
        }
        if self.players.len() >= self.settings.max_players {
            return Err(GameError::TableFull {
                max_players: self.settings.max_players,
            });
        }
        let seat_idx = self.players.len();
        let mut player = Player::new(user_id, name, seat_idx, stack);
        if !self.is_hand_in_progress() {
            player.reset();
        }
        self.players.push(player);
        self.events.push_back(GameEvent::Joined { user_id, seat_idx });
        Ok(seat_idx)
    }

    /// Remove a player. Between hands (or on a frozen table) the seat is
    /// freed immediately. During a hand the player folds (out of turn if need be) and the seat is
    /// freed once the hand is over.
    pub fn unseat_player(&mut self, user_id: UserId) -> GameResult<()> {
        let idx = self.seat_of(user_id)?;

        if self.frozen || !self.is_hand_in_progress() {
            // A frozen hand never pays out, so its contributions go back.
            let player = self.remove_seat(idx);
            self.events.push_back(GameEvent::Left {
                user_id,
                stack: player.stack + player.contributed,
            });
            return Ok(());
        }

        if !self.pending_removal.contains(&user_id) {
            self.pending_removal.push(user_id);
            self.events.push_back(GameEvent::LeaveQueued { user_id });
        }

        let player = &mut self.players[idx];
        if !player.state.in_hand() {
            return Ok(());
        }
        player.state = PlayerState::Fold;
        self.record_bet(user_id, BetKind::Fold, 0);
        self.events.push_back(GameEvent::Action {
            user_id,
            action: Action::Fold,
            amount: 0,
        });

        if self.player_on_clock == Some(idx)
            || self.count_in_hand() <= 1
            || self.is_round_complete()
        {
            let progressed = self.progress(idx);
            self.guard(progressed)?;
        }
        Ok(())
    }

    pub(super) fn remove_seat(&mut self, idx: SeatIndex) -> Player {
        let removed = self.players.remove(idx);
        for (seat_idx, player) in self.players.iter_mut().enumerate() {
            player.seat_idx = seat_idx;
        }
        let n = self.players.len();
        if n == 0 {
            self.dealer_idx = 0;
        } else if idx < self.dealer_idx {
            self.dealer_idx -= 1;
        } else if idx == self.dealer_idx {
            // The next deal moves the button onto whoever sat after the
            // removed dealer.
            self.dealer_idx = (idx + n - 1) % n;
        }
        if self.dealer_idx >= n {
            self.dealer_idx = 0;
        }
        removed
    }

    pub(super) fn seat_of(&self, user_id: UserId) -> GameResult<SeatIndex> {
        self.players
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or(GameError::PlayerNotInTable {
                table_id: self.table_id,
                user_id,
            })
    }

    // === Turn rotation ===

    /// Seats clockwise from `from`, excluding `from` until the very end.
    pub(super) fn clockwise(&self, from: SeatIndex) -> impl Iterator<Item = SeatIndex> + use<> {
        let n = self.players.len();
        (1..=n).map(move |offset| (from + offset) % n)
    }

    pub(super) fn count_in_hand(&self) -> usize {
        self.players.iter().filter(|p| p.state.in_hand()).count()
    }

    /// Next seat clockwise from `current` that can still act. `None` once
    /// fewer than two players contest the pot or nobody can act.
    #[must_use]
    pub fn next_active_player(&self, current: SeatIndex) -> Option<SeatIndex> {
        if self.count_in_hand() < 2 {
            return None;
        }
        self.clockwise(current)
            .find(|&idx| self.players[idx].state.can_act())
    }

    /// Next seat clockwise from `current` that still owes a decision this
    /// street.
    pub(super) fn next_to_act(&self, current: SeatIndex) -> Option<SeatIndex> {
        if self.count_in_hand() < 2 {
            return None;
        }
        self.clockwise(current).find(|&idx| {
            let player = &self.players[idx];
            player.state.can_act()
                && (player.state == PlayerState::Wait || player.current_bet < self.current_bet)
        })
    }

    /// Whether the current street's betting is over. Every player who can
    /// act must have acted since the last raise and matched the bet. A lone
    /// actionable player who owes nothing has nobody left to bet against.
    #[must_use]
    pub fn is_round_complete(&self) -> bool {
        let actionable: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| p.state.can_act())
            .collect();
        let all_matched = actionable
            .iter()
            .all(|p| p.state != PlayerState::Wait && p.current_bet == self.current_bet);
        let lone_and_settled =
            actionable.len() <= 1 && actionable.iter().all(|p| p.current_bet >= self.current_bet);
        all_matched || lone_and_settled
    }

    // === Views ===

    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            table_id: self.table_id,
            round: self.round,
            hand_number: self.hand_number,
            dealer_idx: self.dealer_idx,
            small_blind_idx: self.small_blind_idx,
            big_blind_idx: self.big_blind_idx,
            player_on_clock: self.player_on_clock,
            current_bet: self.current_bet,
            pot: self.pot,
            blinds: self.settings.blinds,
            board: self.board.clone(),
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    user_id: p.user_id,
                    name: p.name.clone(),
                    seat_idx: p.seat_idx,
                    stack: p.stack,
                    current_bet: p.current_bet,
                    state: p.state,
                    has_cards: !p.cards.is_empty(),
                })
                .collect(),
            frozen: self.frozen,
            last_hand: self.last_hand.clone(),
        }
    }

    /// The public snapshot plus the requesting player's hole cards.
    pub fn view_for(&self, user_id: UserId) -> GameResult<PlayerTableView> {
        let idx = self.seat_of(user_id)?;
        Ok(PlayerTableView {
            snapshot: self.snapshot(),
            seat_idx: idx,
            hole_cards: self.players[idx].cards.clone(),
        })
    }

    // === Integrity ===

    pub(super) fn ensure_not_frozen(&self) -> GameResult<()> {
        if self.frozen {
            Err(GameError::TableFrozen(self.table_id))
        } else {
            Ok(())
        }
    }

    /// Check the invariants every completed mutation must preserve.
    pub fn verify_invariants(&self) -> GameResult<()> {
        let contributed: Chips = self.players.iter().map(|p| p.contributed).sum();
        if self.pot != contributed {
            return Err(GameError::InvariantViolation(format!(
                "pot {} != contributions {contributed}",
                self.pot
            )));
        }

        if let Some(p) = self
            .players
            .iter()
            .find(|p| p.state != PlayerState::Fold && p.current_bet > self.current_bet)
        {
            return Err(GameError::InvariantViolation(format!(
                "user {} bet {} above current bet {}",
                p.user_id, p.current_bet, self.current_bet
            )));
        }

        if self.board.len() > BOARD_SIZE {
            return Err(GameError::InvariantViolation(format!(
                "{} cards on the board",
                self.board.len()
            )));
        }

        let mut seen = HashSet::new();
        for card in self
            .board
            .iter()
            .chain(self.players.iter().flat_map(|p| p.cards.iter()))
        {
            if !seen.insert(*card) {
                return Err(GameError::InvariantViolation(format!(
                    "duplicate card {card}"
                )));
            }
        }

        if let Some(idx) = self.player_on_clock {
            match self.players.get(idx) {
                Some(p) if p.state.can_act() => {}
                _ => {
                    return Err(GameError::InvariantViolation(format!(
                        "seat {idx} is on the clock but can't act"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Stop accepting mutations. Only closing or removing the table is
    /// possible afterwards.
    pub fn freeze(&mut self, reason: &str) {
        error!("Table {}: frozen: {}", self.table_id, reason);
        self.frozen = true;
        self.player_on_clock = None;
        self.events.push_back(GameEvent::Frozen {
            reason: reason.to_string(),
        });
    }

    /// Freeze on internal errors, then hand the result back.
    pub(super) fn guard<T>(&mut self, result: GameResult<T>) -> GameResult<T> {
        let result = result.and_then(|value| self.verify_invariants().map(|()| value));
        if let Err(err) = &result {
            if err.is_internal() {
                let reason = err.to_string();
                self.freeze(&reason);
            }
        }
        result
    }

    /// Mark the table closed for good.
    pub fn close(&mut self) {
        self.round = Round::Finished;
        self.player_on_clock = None;
    }

    pub(super) fn record_bet(&mut self, user_id: UserId, kind: BetKind, amount: Chips) {
        self.bets.push(BetRecord {
            table_id: self.table_id,
            user_id,
            hand_number: self.hand_number,
            round: self.round,
            kind,
            amount,
            created_at: Utc::now(),
        });
    }
}
