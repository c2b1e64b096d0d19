/// Property-based tests for hand evaluation using proptest
///
/// These tests verify that the hand evaluation logic is correct
/// across a wide range of randomly generated card combinations.
use holdem_tables::game::{
    entities::{Card, Rank, Suit},
    functional::{argmax, eval, evaluate, split_chips},
};
use proptest::prelude::*;
use std::collections::BTreeSet;

// Strategy to generate a valid card (values 2-14, aces are value 14)
fn card_strategy() -> impl Strategy<Value = Card> {
    (2u8..=14, 0usize..4).prop_map(|(value, suit_idx)| Card(value, Suit::ALL[suit_idx]))
}

// Strategy to generate a vec of unique cards (no duplicates)
fn unique_cards_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<Card>> {
    prop::collection::vec(card_strategy(), min..=max).prop_filter("Cards must be unique", |cards| {
        let set: BTreeSet<_> = cards.iter().collect();
        set.len() == cards.len()
    })
}

// Strategy to generate 7 unique cards (like Texas Hold'em: 2 hole + 5 board)
fn seven_card_hand_strategy() -> impl Strategy<Value = Vec<Card>> {
    unique_cards_strategy(7, 7)
}

fn royal_flush() -> Vec<Card> {
    vec![
        Card(14, Suit::Heart),
        Card(13, Suit::Heart),
        Card(12, Suit::Heart),
        Card(11, Suit::Heart),
        Card(10, Suit::Heart),
    ]
}

proptest! {
    #[test]
    fn test_eval_uses_at_most_five_cards(cards in seven_card_hand_strategy()) {
        let value = eval(&cards);
        prop_assert!(value.values.len() <= 5);
    }

    #[test]
    fn test_eval_is_permutation_invariant(
        cards in seven_card_hand_strategy(),
        rotation in 0usize..7,
    ) {
        let mut shuffled = cards.clone();
        shuffled.rotate_left(rotation);
        shuffled.reverse();
        prop_assert_eq!(eval(&cards), eval(&shuffled));
    }

    #[test]
    fn test_hole_and_board_split_does_not_matter(cards in seven_card_hand_strategy()) {
        let (hole, board) = cards.split_at(2);
        prop_assert_eq!(evaluate(hole, board), eval(&cards));
    }

    #[test]
    fn test_more_cards_never_weaken_a_hand(cards in seven_card_hand_strategy()) {
        prop_assert!(eval(&cards) >= eval(&cards[..5]));
    }

    #[test]
    fn test_royal_flush_beats_everything(cards in unique_cards_strategy(5, 7)) {
        let royal = eval(&royal_flush());
        let other = eval(&cards);
        let royal_cards: BTreeSet<_> = royal_flush().into_iter().collect();
        let is_royal = cards.iter().filter(|c| royal_cards.contains(c)).count() == 5;
        if is_royal {
            prop_assert_eq!(other, royal);
        } else {
            prop_assert!(royal >= other);
        }
    }

    #[test]
    fn test_argmax_indices_are_all_maximal(hands in prop::collection::vec(seven_card_hand_strategy(), 1..6)) {
        let values: Vec<_> = hands.iter().map(|h| eval(h)).collect();
        let winners = argmax(&values);
        prop_assert!(!winners.is_empty());
        let best = values.iter().max().unwrap();
        for (idx, value) in values.iter().enumerate() {
            prop_assert_eq!(winners.contains(&idx), value == best);
        }
    }

    #[test]
    fn test_split_chips_conserves_the_pot(amount in 0u64..100_000, n in 1usize..10) {
        let shares = split_chips(amount, n);
        prop_assert_eq!(shares.len(), n);
        prop_assert_eq!(shares.iter().sum::<u64>(), amount);
        let max = *shares.iter().max().unwrap();
        let min = *shares.iter().min().unwrap();
        prop_assert!(max - min <= 1);
    }
}

#[test]
fn test_broadway_beats_king_high_straight() {
    let broadway = eval(&[
        Card(14, Suit::Club),
        Card(13, Suit::Diamond),
        Card(12, Suit::Heart),
        Card(11, Suit::Spade),
        Card(10, Suit::Club),
    ]);
    let king_high = eval(&[
        Card(13, Suit::Club),
        Card(12, Suit::Diamond),
        Card(11, Suit::Heart),
        Card(10, Suit::Spade),
        Card(9, Suit::Club),
    ]);
    assert_eq!(broadway.rank, Rank::Straight);
    assert!(broadway > king_high);
}

#[test]
fn test_wheel_is_lowest_straight() {
    let wheel = eval(&[
        Card(14, Suit::Club),
        Card(2, Suit::Diamond),
        Card(3, Suit::Heart),
        Card(4, Suit::Spade),
        Card(5, Suit::Club),
    ]);
    let six_high = eval(&[
        Card(2, Suit::Diamond),
        Card(3, Suit::Heart),
        Card(4, Suit::Spade),
        Card(5, Suit::Club),
        Card(6, Suit::Club),
    ]);
    assert_eq!(wheel.rank, Rank::Straight);
    assert_eq!(wheel.values, vec![5, 4, 3, 2, 1]);
    assert!(six_high > wheel);
}

#[test]
fn test_royal_flush_category() {
    assert_eq!(eval(&royal_flush()).rank, Rank::RoyalFlush);
}

#[test]
fn test_odd_chip_split_is_deterministic() {
    assert_eq!(split_chips(100, 2), vec![50, 50]);
    assert_eq!(split_chips(101, 2), vec![51, 50]);
    assert_eq!(split_chips(101, 2), split_chips(101, 2));
}
