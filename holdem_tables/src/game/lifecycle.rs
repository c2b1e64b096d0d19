//! Hand lifecycle: dealing, street transitions, showdown and payouts.

use log::{debug, info};
use std::collections::BTreeMap;

use super::{
    constants::{HOLE_CARDS, MIN_PLAYERS},
    entities::{
        BetKind, Chips, Deck, HandSummary, HandValue, Payout, PlayerResult, PlayerState, Round,
        SeatIndex, ShowdownHand, UserId,
    },
    errors::{GameError, GameResult},
    functional::{argmax, evaluate, split_chips},
    state_machine::{GameEvent, Table},
};

/// One layer of the pot and the seats that can win it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: Vec<SeatIndex>,
}

impl Table {
    /// Deal a new hand: move the button, shuffle a fresh deck, deal hole
    /// cards and post the blinds.
    pub fn start_hand(&mut self) -> GameResult<()> {
        self.ensure_not_frozen()?;
        if self.round != Round::Waiting {
            return Err(GameError::HandInProgress);
        }
        if self.funded_players() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        let started = self.deal_new_hand();
        self.guard(started)
    }

    fn deal_new_hand(&mut self) -> GameResult<()> {
        let n = self.players.len();
        self.hand_number += 1;
        self.action_seq += 1;
        self.hand_actions = 0;
        self.pot = 0;
        self.current_bet = 0;
        self.board.clear();
        for player in &mut self.players {
            player.reset();
        }
        self.dealer_idx = (self.dealer_idx + 1) % n;
        self.round = Round::Preflop;
        info!(
            "Table {}: starting hand #{} with dealer in seat {}",
            self.table_id, self.hand_number, self.dealer_idx
        );
        self.events.push_back(GameEvent::HandStarted {
            hand_number: self.hand_number,
            dealer_idx: self.dealer_idx,
        });

        // One card at a time, starting left of the dealer.
        let mut deck = Deck::shuffled_with(&mut self.rng);
        for _ in 0..HOLE_CARDS {
            for idx in self.clockwise(self.dealer_idx).collect::<Vec<_>>() {
                if self.players[idx].state == PlayerState::Wait {
                    let card = deck.deal_card()?;
                    self.players[idx].cards.push(card);
                }
            }
        }
        self.deck = Some(deck);

        let sb = self.next_dealt_in(self.dealer_idx)?;
        let bb = self.next_dealt_in(sb)?;
        self.small_blind_idx = Some(sb);
        self.big_blind_idx = Some(bb);
        let blinds = self.settings.blinds;
        self.post_blind(sb, BetKind::SmallBlind, blinds.small);
        self.post_blind(bb, BetKind::BigBlind, blinds.big);
        // A short big blind doesn't lower the price of calling.
        self.current_bet = blinds.big;

        self.progress(bb)
    }

    fn next_dealt_in(&self, from: SeatIndex) -> GameResult<SeatIndex> {
        self.clockwise(from)
            .find(|&idx| self.players[idx].state.in_hand())
            .ok_or_else(|| GameError::InvariantViolation("no dealt-in seat for a blind".to_string()))
    }

    fn post_blind(&mut self, idx: SeatIndex, kind: BetKind, amount: Chips) {
        let player = &mut self.players[idx];
        let user_id = player.user_id;
        let moved = player.commit(amount);
        self.pot += moved;
        self.record_bet(user_id, kind, moved);
        self.events.push_back(GameEvent::BlindPosted {
            user_id,
            kind,
            amount: moved,
        });
    }

    /// Move the hand forward after `from` acted: pass the clock, deal the
    /// next street or finish the hand. Streets with no possible betting are
    /// dealt straight through.
    pub(super) fn progress(&mut self, from: SeatIndex) -> GameResult<()> {
        let mut from = from;
        loop {
            if self.count_in_hand() <= 1 {
                return self.award_uncontested();
            }
            if !self.is_round_complete() {
                let next = self.next_to_act(from);
                if next != self.player_on_clock {
                    self.action_seq += 1;
                }
                self.player_on_clock = next;
                return Ok(());
            }

            self.player_on_clock = None;
            match self.round.next_street() {
                Some((Round::Showdown, _)) => return self.showdown(),
                Some((street, n_cards)) => {
                    self.deal_street(street, n_cards)?;
                    from = self.dealer_idx;
                }
                None => {
                    return Err(GameError::InvariantViolation(format!(
                        "no street follows {}",
                        self.round
                    )));
                }
            }
        }
    }

    fn deal_street(&mut self, street: Round, n_cards: usize) -> GameResult<()> {
        let deck = self
            .deck
            .as_mut()
            .ok_or_else(|| GameError::InvariantViolation("no deck in play".to_string()))?;
        let cards = deck.draw(n_cards)?;
        self.board.extend_from_slice(&cards);
        self.round = street;
        self.action_seq += 1;
        self.current_bet = 0;
        for player in &mut self.players {
            player.current_bet = 0;
            if player.state.can_act() {
                player.state = PlayerState::Wait;
            }
        }
        debug!("Table {}: dealt the {}", self.table_id, street);
        self.events.push_back(GameEvent::StreetDealt { round: street, cards });
        Ok(())
    }

    /// Build the main pot and side pots from everyone's contribution this
    /// hand. Folded chips are dead money in every layer they reach.
    #[must_use]
    pub fn side_pots(&self) -> Vec<SidePot> {
        let contenders: Vec<SeatIndex> = self
            .players
            .iter()
            .filter(|p| p.state.in_hand())
            .map(|p| p.seat_idx)
            .collect();
        let mut levels: Vec<Chips> = contenders
            .iter()
            .map(|&idx| self.players[idx].contributed)
            .filter(|&c| c > 0)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        let mut pots: Vec<SidePot> = Vec::with_capacity(levels.len());
        let mut prev = 0;
        for level in levels {
            let amount: Chips = self
                .players
                .iter()
                .map(|p| p.contributed.min(level) - p.contributed.min(prev))
                .sum();
            let eligible = contenders
                .iter()
                .copied()
                .filter(|&idx| self.players[idx].contributed >= level)
                .collect();
            pots.push(SidePot { amount, eligible });
            prev = level;
        }

        // Folded chips above the highest contender level.
        let layered: Chips = pots.iter().map(|pot| pot.amount).sum();
        let leftover = self.pot.saturating_sub(layered);
        if leftover > 0 {
            match pots.last_mut() {
                Some(last) => last.amount += leftover,
                None => pots.push(SidePot {
                    amount: leftover,
                    eligible: contenders,
                }),
            }
        }
        pots
    }

    /// Order winners for odd-chip purposes: first seat clockwise of the
    /// dealer goes first.
    fn payout_order(&self, mut seats: Vec<SeatIndex>) -> Vec<SeatIndex> {
        let n = self.players.len();
        let dealer = self.dealer_idx;
        seats.sort_by_key(|&idx| (idx + n - dealer - 1) % n);
        seats
    }

    fn showdown(&mut self) -> GameResult<()> {
        self.round = Round::Showdown;
        let values: BTreeMap<SeatIndex, HandValue> = self
            .players
            .iter()
            .filter(|p| p.state.in_hand())
            .map(|p| (p.seat_idx, evaluate(&p.cards, &self.board)))
            .collect();

        let mut payouts = Vec::new();
        for (pot_idx, pot) in self.side_pots().into_iter().enumerate() {
            let pot_values: Vec<&HandValue> = pot
                .eligible
                .iter()
                .filter_map(|idx| values.get(idx))
                .collect();
            let winners: Vec<SeatIndex> = argmax(&pot_values)
                .into_iter()
                .map(|i| pot.eligible[i])
                .collect();
            let winners = self.payout_order(winners);
            for (idx, amount) in winners
                .iter()
                .copied()
                .zip(split_chips(pot.amount, winners.len()))
            {
                payouts.push(Payout {
                    pot_idx,
                    user_id: self.players[idx].user_id,
                    seat_idx: idx,
                    amount,
                });
            }
        }

        let showdown = values
            .into_iter()
            .map(|(idx, value)| ShowdownHand {
                user_id: self.players[idx].user_id,
                seat_idx: idx,
                cards: self.players[idx].cards.clone(),
                value,
            })
            .collect();
        self.pay_out(payouts, showdown, false)
    }

    /// Everyone else folded: the last player takes the whole pot and shows
    /// nothing.
    fn award_uncontested(&mut self) -> GameResult<()> {
        let idx = self
            .players
            .iter()
            .position(|p| p.state.in_hand())
            .ok_or_else(|| GameError::InvariantViolation("nobody left in the hand".to_string()))?;
        let payouts = vec![Payout {
            pot_idx: 0,
            user_id: self.players[idx].user_id,
            seat_idx: idx,
            amount: self.pot,
        }];
        self.pay_out(payouts, Vec::new(), true)
    }

    fn pay_out(
        &mut self,
        payouts: Vec<Payout>,
        showdown: Vec<ShowdownHand>,
        uncontested: bool,
    ) -> GameResult<()> {
        let pot = self.pot;
        let paid: Chips = payouts.iter().map(|p| p.amount).sum();
        if paid != pot {
            return Err(GameError::InvariantViolation(format!(
                "paid out {paid} from a pot of {pot}"
            )));
        }

        let mut won: BTreeMap<UserId, Chips> = BTreeMap::new();
        for payout in &payouts {
            self.players[payout.seat_idx].stack += payout.amount;
            *won.entry(payout.user_id).or_default() += payout.amount;
        }
        self.pot = 0;

        let results = self
            .players
            .iter()
            .filter(|p| p.contributed > 0 || !p.cards.is_empty())
            .map(|p| PlayerResult {
                user_id: p.user_id,
                contributed: p.contributed,
                won: won.get(&p.user_id).copied().unwrap_or_default(),
            })
            .collect();

        let summary = HandSummary {
            hand_number: self.hand_number,
            board: self.board.clone(),
            pot,
            uncontested,
            showdown,
            payouts,
            results,
        };
        info!(
            "Table {}: hand #{} finished, pot of {} paid to {:?}",
            self.table_id,
            self.hand_number,
            pot,
            won.keys().collect::<Vec<_>>()
        );
        self.conclude_hand(summary)
    }

    /// Clear per-hand state, free seats of players who left mid-hand and
    /// deal again if the table is set to.
    fn conclude_hand(&mut self, summary: HandSummary) -> GameResult<()> {
        self.last_hand = Some(summary.clone());
        self.events
            .push_back(GameEvent::HandFinished(Box::new(summary)));

        for user_id in std::mem::take(&mut self.pending_removal) {
            if let Ok(idx) = self.seat_of(user_id) {
                let player = self.remove_seat(idx);
                self.events.push_back(GameEvent::Left {
                    user_id,
                    stack: player.stack,
                });
            }
        }

        for player in &mut self.players {
            player.reset();
        }
        self.round = Round::Waiting;
        self.player_on_clock = None;
        self.small_blind_idx = None;
        self.big_blind_idx = None;
        self.current_bet = 0;
        self.board.clear();
        self.deck = None;
        self.action_seq += 1;

        // A hand nobody acted in (blinds put everyone all-in) doesn't
        // chain into another one on its own.
        if self.settings.auto_start_next_hand
            && self.hand_actions > 0
            && self.funded_players() >= MIN_PLAYERS
        {
            return self.deal_new_hand();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{
        entities::{Action, Card, Suit},
        state_machine::GameSettings,
    };

    fn table(stacks: &[Chips]) -> Table {
        let mut table = Table::with_seed(1, GameSettings::new(5, 10, 6), 11);
        for (i, &stack) in stacks.iter().enumerate() {
            table
                .seat_player(i as UserId + 1, format!("player{i}"), stack)
                .unwrap();
        }
        table
    }

    // === Start Hand Tests ===

    #[test]
    fn test_start_hand_needs_two_funded_players() {
        let mut table = table(&[100, 0]);
        assert_eq!(table.start_hand(), Err(GameError::NotEnoughPlayers));
        assert_eq!(table.round(), Round::Waiting);
    }

    #[test]
    fn test_start_hand_rejects_hand_in_progress() {
        let mut table = table(&[100, 100]);
        table.start_hand().unwrap();
        assert_eq!(table.start_hand(), Err(GameError::HandInProgress));
    }

    #[test]
    fn test_start_hand_deals_and_posts_blinds() {
        let mut table = table(&[100, 100, 100]);
        table.start_hand().unwrap();
        assert_eq!(table.hand_number(), 1);
        assert_eq!(table.dealer_idx(), 1);
        assert_eq!(table.round(), Round::Preflop);
        assert!(table.players().iter().all(|p| p.cards.len() == 2));
        assert_eq!(table.players()[2].current_bet, 5);
        assert_eq!(table.players()[0].current_bet, 10);
        assert_eq!(table.current_bet(), 10);
        assert_eq!(table.pot(), 15);
        assert_eq!(table.player_on_clock(), Some(1));
        table.verify_invariants().unwrap();
    }

    #[test]
    fn test_dealer_advances_every_hand() {
        let mut table = table(&[100, 100, 100]);
        for expected in [1, 2, 0, 1] {
            table.start_hand().unwrap();
            assert_eq!(table.dealer_idx(), expected);
            while let Some(user_id) = table.user_on_clock() {
                table.apply_action(user_id, Action::Fold).unwrap();
            }
            assert_eq!(table.round(), Round::Waiting);
        }
    }

    #[test]
    fn test_heads_up_big_blind_is_dealer() {
        let mut table = table(&[100, 100]);
        table.start_hand().unwrap();
        assert_eq!(table.dealer_idx(), 1);
        assert_eq!(table.snapshot().small_blind_idx, Some(0));
        assert_eq!(table.snapshot().big_blind_idx, Some(1));
        assert_eq!(table.player_on_clock(), Some(0));
    }

    #[test]
    fn test_busted_player_sits_out() {
        let mut table = table(&[100, 0, 100]);
        table.start_hand().unwrap();
        assert_eq!(table.players()[1].state, PlayerState::SitOut);
        assert!(table.players()[1].cards.is_empty());
        // Dealer is the busted seat, blinds skip it.
        assert_eq!(table.dealer_idx(), 1);
        assert_eq!(table.snapshot().small_blind_idx, Some(2));
        assert_eq!(table.snapshot().big_blind_idx, Some(0));
    }

    #[test]
    fn test_short_blinds_go_all_in_and_run_out() {
        let mut table = table(&[3, 7]);
        table.start_hand().unwrap();
        // Both blinds are all-in, so the board runs out and the hand ends.
        assert_eq!(table.round(), Round::Waiting);
        let summary = table.last_hand().unwrap();
        assert_eq!(summary.board.len(), 5);
        assert_eq!(summary.pot, 10);
        let total: Chips = table.players().iter().map(|p| p.stack).sum();
        assert_eq!(total, 10);
    }

    // === Side Pot Tests ===

    #[test]
    fn test_side_pots_by_contribution_level() {
        let mut table = table(&[100, 100, 100]);
        table.round = Round::River;
        let contributions = [(50, PlayerState::AllIn), (100, PlayerState::Call), (100, PlayerState::Call)];
        for (player, (c, state)) in table.players.iter_mut().zip(contributions) {
            player.contributed = c;
            player.state = state;
        }
        table.pot = 250;
        let pots = table.side_pots();
        assert_eq!(
            pots,
            vec![
                SidePot {
                    amount: 150,
                    eligible: vec![0, 1, 2]
                },
                SidePot {
                    amount: 100,
                    eligible: vec![1, 2]
                },
            ]
        );
    }

    #[test]
    fn test_folded_chips_are_dead_money() {
        let mut table = table(&[100, 100, 100]);
        let contributions = [(80, PlayerState::Fold), (30, PlayerState::AllIn), (60, PlayerState::Call)];
        for (player, (c, state)) in table.players.iter_mut().zip(contributions) {
            player.contributed = c;
            player.state = state;
        }
        table.pot = 170;
        let pots = table.side_pots();
        assert_eq!(pots[0].amount, 90);
        assert_eq!(pots[0].eligible, vec![1, 2]);
        // Seat 0's chips above 60 land in the top layer.
        assert_eq!(pots[1].amount, 80);
        assert_eq!(pots[1].eligible, vec![2]);
    }

    // === Showdown Tests ===

    #[test]
    fn test_split_pot_odd_chip_goes_left_of_dealer() {
        let mut table = table(&[200, 200, 200]);
        table.start_hand().unwrap();
        // Force a chopped board and an odd pot.
        table.board = vec![
            Card(14, Suit::Club),
            Card(13, Suit::Diamond),
            Card(12, Suit::Heart),
            Card(11, Suit::Spade),
            Card(10, Suit::Club),
        ];
        table.players[0].cards = vec![Card(2, Suit::Heart), Card(3, Suit::Heart)];
        table.players[1].cards = vec![Card(2, Suit::Spade), Card(3, Suit::Spade)];
        table.players[2].cards = vec![Card(4, Suit::Diamond), Card(5, Suit::Diamond)];
        for player in &mut table.players {
            player.stack += player.contributed;
            player.contributed = 0;
            player.current_bet = 0;
        }
        table.players[0].contributed = 50;
        table.players[1].contributed = 51;
        table.players[1].state = PlayerState::Fold;
        table.players[2].contributed = 50;
        table.players[0].stack -= 50;
        table.players[1].stack -= 51;
        table.players[2].stack -= 50;
        table.pot = 151;
        table.showdown().unwrap();

        let summary = table.last_hand().unwrap();
        // Dealer is seat 1, so seat 2 is first clockwise and gets the odd chip.
        assert_eq!(summary.payout_for(3), 76);
        assert_eq!(summary.payout_for(1), 75);
        assert_eq!(summary.payout_for(2), 0);
        assert_eq!(summary.showdown.len(), 2);
    }

    // === Next Hand Tests ===

    fn auto_table(stacks: &[Chips]) -> Table {
        let mut settings = GameSettings::new(5, 10, 6);
        settings.auto_start_next_hand = true;
        let mut table = Table::with_seed(1, settings, 11);
        for (i, &stack) in stacks.iter().enumerate() {
            table
                .seat_player(i as UserId + 1, format!("player{i}"), stack)
                .unwrap();
        }
        table
    }

    #[test]
    fn test_auto_start_deals_after_a_played_hand() {
        let mut table = auto_table(&[100, 100]);
        table.start_hand().unwrap();
        let user_id = table.user_on_clock().unwrap();
        table.apply_action(user_id, Action::Fold).unwrap();

        assert_eq!(table.last_hand().unwrap().hand_number, 1);
        assert_eq!(table.hand_number(), 2);
        assert_eq!(table.round(), Round::Preflop);
    }

    #[test]
    fn test_auto_start_skips_hand_nobody_acted_in() {
        // Both blinds are all-in; whether the board splits the pot or not,
        // the table waits instead of dealing again.
        let mut table = auto_table(&[5, 5]);
        table.start_hand().unwrap();

        assert_eq!(table.hand_number(), 1);
        assert_eq!(table.round(), Round::Waiting);
        assert!(table.last_hand().is_some());
    }

    #[test]
    fn test_leaving_mid_hand_takes_final_stack() {
        let mut table = table(&[100, 100, 100]);
        table.start_hand().unwrap();
        table.drain_events();

        // Seat 0 is the big blind; it leaves with its blind in the pot.
        table.unseat_player(1).unwrap();
        assert!(table
            .drain_events()
            .iter()
            .all(|e| !matches!(e, GameEvent::Left { .. })));

        while let Some(user_id) = table.user_on_clock() {
            table.apply_action(user_id, Action::Fold).unwrap();
        }

        let left: Vec<_> = table
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::Left { user_id, stack } => Some((user_id, stack)),
                _ => None,
            })
            .collect();
        assert_eq!(left, vec![(1, 90)]);
        assert_eq!(table.num_players(), 2);
    }

    #[test]
    fn test_leaving_between_hands_takes_whole_stack() {
        let mut table = table(&[100, 250]);
        table.drain_events();
        table.unseat_player(2).unwrap();
        assert_eq!(
            table.drain_events(),
            vec![GameEvent::Left {
                user_id: 2,
                stack: 250
            }]
        );
    }
}
