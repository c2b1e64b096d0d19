//! Betting-round engine: action validation and chip movement.

use log::debug;

use super::{
    entities::{Action, BetKind, Chips, PlayerState, SeatIndex, UserId},
    errors::{ActionRejection, GameError, GameResult},
    state_machine::{GameEvent, Table},
};

/// What a validated action will do to the acting player.
enum Move {
    Fold,
    Check,
    Call(Chips),
    /// Chips to add so the player's street bet reaches the raise target.
    Raise(Chips),
    AllIn,
}

impl Table {
    /// Validate and apply one player's action, then move the hand along.
    ///
    /// Invalid actions return [`GameError::InvalidAction`] and leave the
    /// table untouched.
    pub fn apply_action(&mut self, user_id: UserId, action: Action) -> GameResult<()> {
        self.ensure_not_frozen()?;
        let idx = self.seat_of(user_id)?;
        let mv = self
            .validate_action(idx, action)
            .map_err(|reason| GameError::InvalidAction {
                table_id: self.table_id,
                user_id,
                action,
                reason,
            })?;

        let amount = self.execute(idx, mv);
        self.hand_actions += 1;
        self.action_seq += 1;
        debug!(
            "Table {}: user {} chose to {} ({} chips)",
            self.table_id, user_id, action, amount
        );
        self.events.push_back(GameEvent::Action {
            user_id,
            action,
            amount,
        });

        let progressed = self.progress(idx);
        self.guard(progressed)
    }

    /// Act for the player on the clock when their time runs out: check if
    /// that's free, otherwise fold.
    pub fn act_on_timeout(&mut self) -> GameResult<Option<(UserId, Action)>> {
        let Some(idx) = self.player_on_clock else {
            return Ok(None);
        };
        let player = &self.players[idx];
        let action = if player.current_bet == self.current_bet {
            Action::Check
        } else {
            Action::Fold
        };
        let user_id = player.user_id;
        self.apply_action(user_id, action)?;
        Ok(Some((user_id, action)))
    }

    fn validate_action(&self, idx: SeatIndex, action: Action) -> Result<Move, ActionRejection> {
        if !self.round.is_betting() {
            return Err(ActionRejection::NoBettingRound { round: self.round });
        }
        let player = &self.players[idx];
        match player.state {
            PlayerState::Fold => return Err(ActionRejection::AlreadyFolded),
            PlayerState::AllIn => return Err(ActionRejection::AlreadyAllIn),
            _ => {}
        }
        if self.player_on_clock != Some(idx) {
            return Err(ActionRejection::OutOfTurn);
        }

        let owed = player.to_call(self.current_bet);
        match action {
            Action::Fold => Ok(Move::Fold),
            Action::Check if owed > 0 => Err(ActionRejection::CannotCheck { owed }),
            Action::Check => Ok(Move::Check),
            Action::Call if owed == 0 => Ok(Move::Check),
            Action::Call if owed >= player.stack => Ok(Move::AllIn),
            Action::Call => Ok(Move::Call(owed)),
            Action::Raise(target) if target <= self.current_bet => {
                Err(ActionRejection::RaiseTooSmall {
                    target,
                    current_bet: self.current_bet,
                })
            }
            Action::Raise(target) => {
                let needed = target - player.current_bet;
                if needed >= player.stack {
                    Ok(Move::AllIn)
                } else {
                    Ok(Move::Raise(needed))
                }
            }
            Action::AllIn if player.stack == 0 => Err(ActionRejection::NoChips),
            Action::AllIn => Ok(Move::AllIn),
        }
    }

    /// Apply a validated move. Returns the chips moved into the pot.
    fn execute(&mut self, idx: SeatIndex, mv: Move) -> Chips {
        let user_id = self.players[idx].user_id;
        let (kind, moved) = match mv {
            Move::Fold => {
                self.players[idx].state = PlayerState::Fold;
                (BetKind::Fold, 0)
            }
            Move::Check => {
                self.players[idx].state = PlayerState::Check;
                (BetKind::Check, 0)
            }
            Move::Call(chips) => {
                let moved = self.players[idx].commit(chips);
                self.players[idx].state = PlayerState::Call;
                (BetKind::Call, moved)
            }
            Move::Raise(chips) => {
                let moved = self.players[idx].commit(chips);
                self.players[idx].state = PlayerState::Raise;
                (BetKind::Raise, moved)
            }
            Move::AllIn => {
                let stack = self.players[idx].stack;
                let moved = self.players[idx].commit(stack);
                self.players[idx].state = PlayerState::AllIn;
                (BetKind::AllIn, moved)
            }
        };
        self.pot += moved;

        // Anything that lifts the bet reopens the action for everyone else.
        let bet = self.players[idx].current_bet;
        if bet > self.current_bet {
            self.current_bet = bet;
            for (other_idx, other) in self.players.iter_mut().enumerate() {
                if other_idx != idx && other.state.can_act() {
                    other.state = PlayerState::Wait;
                }
            }
        }

        self.record_bet(user_id, kind, moved);
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{entities::Round, state_machine::GameSettings};

    /// Three players, 5/10 blinds, hand started. Seat 1 is the dealer, so
    /// seat 2 posts the small blind, seat 0 the big blind and seat 1 acts
    /// first.
    fn three_handed() -> Table {
        let mut table = Table::with_seed(1, GameSettings::new(5, 10, 6), 7);
        for user_id in 1..=3 {
            table
                .seat_player(user_id, format!("player{user_id}"), 1000)
                .unwrap();
        }
        table.start_hand().unwrap();
        table
    }

    fn on_clock(table: &Table) -> UserId {
        table.user_on_clock().unwrap()
    }

    // === Validation Tests ===

    #[test]
    fn test_out_of_turn_action_rejected() {
        let mut table = three_handed();
        let before = table.snapshot();
        let err = table.apply_action(1, Action::Call).unwrap_err();
        assert!(matches!(
            err,
            GameError::InvalidAction {
                reason: ActionRejection::OutOfTurn,
                ..
            }
        ));
        assert_eq!(table.snapshot(), before);
    }

    #[test]
    fn test_check_facing_bet_rejected() {
        let mut table = three_handed();
        let err = table.apply_action(on_clock(&table), Action::Check).unwrap_err();
        assert!(matches!(
            err,
            GameError::InvalidAction {
                reason: ActionRejection::CannotCheck { owed: 10 },
                ..
            }
        ));
    }

    #[test]
    fn test_raise_must_exceed_current_bet() {
        let mut table = three_handed();
        let err = table
            .apply_action(on_clock(&table), Action::Raise(10))
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::InvalidAction {
                reason: ActionRejection::RaiseTooSmall {
                    target: 10,
                    current_bet: 10
                },
                ..
            }
        ));
    }

    #[test]
    fn test_folded_player_cannot_act() {
        let mut table = three_handed();
        let folder = on_clock(&table);
        table.apply_action(folder, Action::Fold).unwrap();
        let err = table.apply_action(folder, Action::Call).unwrap_err();
        assert!(matches!(
            err,
            GameError::InvalidAction {
                reason: ActionRejection::AlreadyFolded,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_player_rejected() {
        let mut table = three_handed();
        assert!(matches!(
            table.apply_action(99, Action::Fold),
            Err(GameError::PlayerNotInTable { user_id: 99, .. })
        ));
    }

    // === Effect Tests ===

    #[test]
    fn test_call_moves_difference() {
        let mut table = three_handed();
        let caller = on_clock(&table);
        table.apply_action(caller, Action::Call).unwrap();
        let player = table.player(caller).unwrap();
        assert_eq!(player.current_bet, 10);
        assert_eq!(player.stack, 990);
        assert_eq!(player.state, PlayerState::Call);
        assert_eq!(table.pot(), 25);
    }

    #[test]
    fn test_raise_reopens_action() {
        let mut table = three_handed();
        let caller = on_clock(&table);
        table.apply_action(caller, Action::Call).unwrap();
        let raiser = on_clock(&table);
        table.apply_action(raiser, Action::Raise(40)).unwrap();
        assert_eq!(table.current_bet(), 40);
        assert_eq!(table.player(raiser).unwrap().current_bet, 40);
        assert_eq!(table.player(caller).unwrap().state, PlayerState::Wait);
        assert!(!table.is_round_complete());
    }

    #[test]
    fn test_oversized_raise_goes_all_in() {
        let mut table = three_handed();
        let shover = on_clock(&table);
        table.apply_action(shover, Action::Raise(5000)).unwrap();
        let player = table.player(shover).unwrap();
        assert_eq!(player.state, PlayerState::AllIn);
        assert_eq!(player.stack, 0);
        assert_eq!(table.current_bet(), 1000);
    }

    #[test]
    fn test_call_with_nothing_owed_is_check() {
        let mut table = three_handed();
        let first = on_clock(&table);
        table.apply_action(first, Action::Call).unwrap();
        let sb = on_clock(&table);
        table.apply_action(sb, Action::Call).unwrap();
        let bb = on_clock(&table);
        table.apply_action(bb, Action::Call).unwrap();
        assert_eq!(table.round(), Round::Flop);
        assert_eq!(table.pot(), 30);
    }

    #[test]
    fn test_bets_are_recorded() {
        let mut table = three_handed();
        let first = on_clock(&table);
        table.apply_action(first, Action::Raise(30)).unwrap();
        let bets = table.drain_bets();
        let kinds: Vec<_> = bets.iter().map(|b| b.kind).collect();
        assert_eq!(kinds, vec![BetKind::SmallBlind, BetKind::BigBlind, BetKind::Raise]);
        assert_eq!(bets[2].amount, 30);
        assert!(table.drain_bets().is_empty());
    }

    // === Timeout Tests ===

    #[test]
    fn test_timeout_folds_when_facing_bet() {
        let mut table = three_handed();
        let first = on_clock(&table);
        assert_eq!(table.act_on_timeout().unwrap(), Some((first, Action::Fold)));
        assert_eq!(table.player(first).unwrap().state, PlayerState::Fold);
    }

    #[test]
    fn test_timeout_checks_when_free() {
        let mut table = three_handed();
        for _ in 0..3 {
            let user = on_clock(&table);
            table.apply_action(user, Action::Call).unwrap();
        }
        assert_eq!(table.round(), Round::Flop);
        let first = on_clock(&table);
        assert_eq!(
            table.act_on_timeout().unwrap(),
            Some((first, Action::Check))
        );
    }
}
