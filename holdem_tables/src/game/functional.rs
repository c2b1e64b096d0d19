//! Pure hand-evaluation and pot-splitting helpers.

use super::entities::{ACE, Card, Chips, HandValue, Rank, Suit, Value};

const FIVE: usize = 5;

/// Highest straight contained in `present`, where `present[v]` says value
/// `v` is available. An ace also counts as 1 for the wheel.
fn highest_straight(present: &[bool; 15]) -> Option<Value> {
    let has = |v: Value| -> bool {
        if v == 1 {
            present[ACE as usize]
        } else {
            present[v as usize]
        }
    };
    (5..=ACE).rev().find(|&high| (high - 4..=high).all(has))
}

fn straight_values(high: Value) -> Vec<Value> {
    (high - 4..=high).rev().collect()
}

/// Evaluate the best five-card hand out of up to seven cards. Fewer than
/// five cards are ranked on what is there (pairs, trips, quads, high cards).
#[must_use]
pub fn eval(cards: &[Card]) -> HandValue {
    let mut counts = [0u8; 15];
    let mut present = [false; 15];
    for card in cards {
        counts[card.0 as usize] += 1;
        present[card.0 as usize] = true;
    }

    let mut suited: Vec<Value> = Vec::new();
    if cards.len() >= FIVE {
        for suit in Suit::ALL {
            let mut values: Vec<Value> = cards
                .iter()
                .filter(|c| c.1 == suit)
                .map(|c| c.0)
                .collect();
            if values.len() >= FIVE {
                values.sort_unstable_by(|a, b| b.cmp(a));
                suited = values;
                break;
            }
        }
    }

    if !suited.is_empty() {
        let mut suited_present = [false; 15];
        for &v in &suited {
            suited_present[v as usize] = true;
        }
        if let Some(high) = highest_straight(&suited_present) {
            let rank = if high == ACE {
                Rank::RoyalFlush
            } else {
                Rank::StraightFlush
            };
            return HandValue {
                rank,
                values: straight_values(high),
            };
        }
    }

    // Values grouped by multiplicity, highest value first within a group.
    let by_count = |n: u8| -> Vec<Value> {
        (2..=ACE).rev().filter(|&v| counts[v as usize] == n).collect()
    };
    let quads = by_count(4);
    let trips = by_count(3);
    let pairs = by_count(2);

    let kickers = |exclude: &[Value], n: usize| -> Vec<Value> {
        let mut values: Vec<Value> = cards
            .iter()
            .map(|c| c.0)
            .filter(|v| !exclude.contains(v))
            .collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        values.truncate(n);
        values
    };

    if let Some(&quad) = quads.first() {
        let mut values = vec![quad; 4];
        values.extend(kickers(&[quad], 1));
        return HandValue {
            rank: Rank::FourOfAKind,
            values,
        };
    }

    if let Some(&trip) = trips.first() {
        // A second set of trips plays as the pair.
        let pair = trips
            .iter()
            .skip(1)
            .chain(pairs.iter())
            .copied()
            .max();
        if let Some(pair) = pair {
            return HandValue {
                rank: Rank::FullHouse,
                values: vec![trip, trip, trip, pair, pair],
            };
        }
    }

    if !suited.is_empty() {
        suited.truncate(FIVE);
        return HandValue {
            rank: Rank::Flush,
            values: suited,
        };
    }

    if let Some(high) = highest_straight(&present) {
        return HandValue {
            rank: Rank::Straight,
            values: straight_values(high),
        };
    }

    if let Some(&trip) = trips.first() {
        let mut values = vec![trip; 3];
        values.extend(kickers(&[trip], 2));
        return HandValue {
            rank: Rank::ThreeOfAKind,
            values,
        };
    }

    match pairs.as_slice() {
        [high, low, ..] => {
            let mut values = vec![*high, *high, *low, *low];
            values.extend(kickers(&[*high, *low], 1));
            HandValue {
                rank: Rank::TwoPair,
                values,
            }
        }
        [pair] => {
            let mut values = vec![*pair, *pair];
            values.extend(kickers(&[*pair], 3));
            HandValue {
                rank: Rank::OnePair,
                values,
            }
        }
        [] => HandValue {
            rank: Rank::HighCard,
            values: kickers(&[], FIVE),
        },
    }
}

/// Evaluate a player's hole cards together with the board.
#[must_use]
pub fn evaluate(hole: &[Card], board: &[Card]) -> HandValue {
    let mut cards = Vec::with_capacity(hole.len() + board.len());
    cards.extend_from_slice(hole);
    cards.extend_from_slice(board);
    eval(&cards)
}

/// Get the indices corresponding to the maximum values in an array.
/// Ties all come back, in input order.
#[must_use]
pub fn argmax<T: Ord>(values: &[T]) -> Vec<usize> {
    let Some(best) = values.iter().max() else {
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| *v == best)
        .map(|(idx, _)| idx)
        .collect()
}

/// Split `amount` between `n` winners with integer division. The first
/// `amount % n` shares get one extra chip, so callers pass winners in
/// payout order.
#[must_use]
pub fn split_chips(amount: Chips, n: usize) -> Vec<Chips> {
    if n == 0 {
        return Vec::new();
    }
    let n_chips = n as Chips;
    let share = amount / n_chips;
    let odd = (amount % n_chips) as usize;
    (0..n)
        .map(|idx| if idx < odd { share + 1 } else { share })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Suit::{Club, Diamond, Heart, Spade};

    fn hand(cards: &[(Value, Suit)]) -> Vec<Card> {
        cards.iter().map(|&(v, s)| Card(v, s)).collect()
    }

    // === Category Tests ===

    #[test]
    fn test_royal_flush() {
        let cards = hand(&[
            (14, Heart),
            (13, Heart),
            (12, Heart),
            (11, Heart),
            (10, Heart),
            (9, Spade),
            (2, Club),
        ]);
        let value = eval(&cards);
        assert_eq!(value.rank, Rank::RoyalFlush);
        assert_eq!(value.values, vec![14, 13, 12, 11, 10]);
    }

    #[test]
    fn test_straight_flush_beats_quads() {
        let sf = eval(&hand(&[
            (9, Club),
            (8, Club),
            (7, Club),
            (6, Club),
            (5, Club),
        ]));
        let quads = eval(&hand(&[
            (14, Club),
            (14, Spade),
            (14, Heart),
            (14, Diamond),
            (13, Club),
        ]));
        assert_eq!(sf.rank, Rank::StraightFlush);
        assert_eq!(quads.rank, Rank::FourOfAKind);
        assert!(sf > quads);
    }

    #[test]
    fn test_wheel_is_lowest_straight() {
        let wheel = eval(&hand(&[
            (14, Club),
            (2, Spade),
            (3, Heart),
            (4, Diamond),
            (5, Club),
            (13, Heart),
        ]));
        assert_eq!(wheel.rank, Rank::Straight);
        assert_eq!(wheel.values, vec![5, 4, 3, 2, 1]);

        let six_high = eval(&hand(&[
            (2, Spade),
            (3, Heart),
            (4, Diamond),
            (5, Club),
            (6, Heart),
        ]));
        assert!(six_high > wheel);
    }

    #[test]
    fn test_steel_wheel() {
        let value = eval(&hand(&[
            (14, Spade),
            (2, Spade),
            (3, Spade),
            (4, Spade),
            (5, Spade),
        ]));
        assert_eq!(value.rank, Rank::StraightFlush);
        assert_eq!(value.values, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_full_house_from_two_trips() {
        let value = eval(&hand(&[
            (9, Club),
            (9, Spade),
            (9, Heart),
            (4, Diamond),
            (4, Club),
            (4, Heart),
            (2, Spade),
        ]));
        assert_eq!(value.rank, Rank::FullHouse);
        assert_eq!(value.values, vec![9, 9, 9, 4, 4]);
    }

    #[test]
    fn test_flush_uses_top_five() {
        let value = eval(&hand(&[
            (2, Heart),
            (7, Heart),
            (9, Heart),
            (11, Heart),
            (13, Heart),
            (4, Heart),
            (14, Spade),
        ]));
        assert_eq!(value.rank, Rank::Flush);
        assert_eq!(value.values, vec![13, 11, 9, 7, 4]);
    }

    #[test]
    fn test_two_pair_picks_best_pairs_and_kicker() {
        let value = eval(&hand(&[
            (10, Heart),
            (10, Club),
            (6, Spade),
            (6, Diamond),
            (3, Heart),
            (3, Spade),
            (12, Club),
        ]));
        assert_eq!(value.rank, Rank::TwoPair);
        assert_eq!(value.values, vec![10, 10, 6, 6, 12]);
    }

    #[test]
    fn test_short_hands() {
        let pocket_pair = eval(&hand(&[(8, Heart), (8, Club)]));
        assert_eq!(pocket_pair.rank, Rank::OnePair);
        assert_eq!(pocket_pair.values, vec![8, 8]);

        let high = eval(&hand(&[(14, Heart), (3, Club)]));
        assert_eq!(high.rank, Rank::HighCard);
        assert_eq!(high.values, vec![14, 3]);
    }

    #[test]
    fn test_kickers_break_ties() {
        let board = hand(&[(13, Club), (13, Spade), (7, Heart), (4, Diamond), (2, Club)]);
        let ace_kicker = evaluate(&hand(&[(14, Heart), (9, Club)]), &board);
        let queen_kicker = evaluate(&hand(&[(12, Heart), (9, Spade)]), &board);
        assert_eq!(ace_kicker.rank, Rank::OnePair);
        assert!(ace_kicker > queen_kicker);
    }

    #[test]
    fn test_board_plays() {
        let board = hand(&[
            (14, Club),
            (13, Spade),
            (12, Heart),
            (11, Diamond),
            (10, Club),
        ]);
        let a = evaluate(&hand(&[(2, Heart), (3, Club)]), &board);
        let b = evaluate(&hand(&[(4, Heart), (5, Club)]), &board);
        assert_eq!(a, b);
    }

    // === argmax Tests ===

    #[test]
    fn test_argmax_returns_all_ties() {
        assert_eq!(argmax(&[3, 7, 1, 7]), vec![1, 3]);
        assert_eq!(argmax(&[5]), vec![0]);
        assert!(argmax::<u8>(&[]).is_empty());
    }

    // === split_chips Tests ===

    #[test]
    fn test_split_even() {
        assert_eq!(split_chips(100, 2), vec![50, 50]);
    }

    #[test]
    fn test_split_odd_chip_goes_first() {
        assert_eq!(split_chips(101, 2), vec![51, 50]);
        assert_eq!(split_chips(10, 3), vec![4, 3, 3]);
        assert_eq!(split_chips(10, 0), Vec::<Chips>::new());
    }
}
