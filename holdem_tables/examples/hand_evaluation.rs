//! Hand Evaluation Example
//!
//! Demonstrates how to use the hand evaluation functions to compare poker
//! hands, then plays one seeded hand to showdown.

use holdem_tables::entities::{Action, Card, Suit};
use holdem_tables::functional::{argmax, eval, evaluate};
use holdem_tables::{GameSettings, Table};

fn main() {
    println!("=== Poker Hand Evaluation Example ===\n");

    // Example 1: Evaluate a single hand
    println!("Example 1: Evaluating a 7-card hand");
    let hand1 = vec![
        Card(14, Suit::Heart), // Ace of Hearts
        Card(13, Suit::Heart), // King of Hearts
        Card(12, Suit::Heart), // Queen of Hearts
        Card(11, Suit::Heart), // Jack of Hearts
        Card(10, Suit::Heart), // Ten of Hearts
        Card(9, Suit::Spade),  // Nine of Spades
        Card(2, Suit::Club),   // Two of Clubs
    ];

    let result = eval(&hand1);
    println!("Hand: {}", format_cards(&hand1));
    println!("Rank: {} {:?}\n", result.rank, result.values);

    // Example 2: Compare two hands sharing a board
    println!("Example 2: Comparing two hands on the same board");
    let board = vec![
        Card(10, Suit::Club),
        Card(9, Suit::Diamond),
        Card(2, Suit::Spade),
        Card(7, Suit::Heart),
        Card(4, Suit::Club),
    ];
    let aces = [Card(14, Suit::Spade), Card(14, Suit::Heart)];
    let kings = [Card(13, Suit::Spade), Card(13, Suit::Heart)];

    let eval_a = evaluate(&aces, &board);
    let eval_b = evaluate(&kings, &board);
    println!("Board: {}", format_cards(&board));
    println!("Hand A: {} -> {}", format_cards(&aces), eval_a.rank);
    println!("Hand B: {} -> {}", format_cards(&kings), eval_b.rank);

    match argmax(&[eval_a, eval_b]).as_slice() {
        [0] => println!("Winner: Hand A (Pair of Aces)"),
        [1] => println!("Winner: Hand B (Pair of Kings)"),
        _ => println!("Tie!"),
    }

    // Example 3: Multiple hands with a tie
    println!("\n\nExample 3: Three-way comparison with a tie");

    let hands = [
        vec![
            Card(10, Suit::Heart),
            Card(10, Suit::Diamond),
            Card(5, Suit::Club),
            Card(3, Suit::Spade),
            Card(2, Suit::Heart),
        ],
        vec![
            Card(10, Suit::Spade),
            Card(10, Suit::Club),
            Card(5, Suit::Heart),
            Card(3, Suit::Diamond),
            Card(2, Suit::Club),
        ],
        vec![
            Card(9, Suit::Heart),
            Card(9, Suit::Diamond),
            Card(5, Suit::Club),
            Card(3, Suit::Spade),
            Card(2, Suit::Heart),
        ],
    ];

    let evaluations: Vec<_> = hands.iter().map(|h| eval(h)).collect();
    for (i, (hand, value)) in hands.iter().zip(&evaluations).enumerate() {
        println!("Hand {}: {}  ({})", i + 1, format_cards(hand), value.rank);
    }

    let winners = argmax(&evaluations);
    println!(
        "Winner(s): Hands {:?}",
        winners.iter().map(|&i| i + 1).collect::<Vec<_>>()
    );

    // Example 4: A seeded hand checked down to showdown
    println!("\n\nExample 4: Three players check the hand down");

    let mut table = Table::with_seed(1, GameSettings::new(5, 10, 6), 7);
    for (user_id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
        table
            .seat_player(user_id, name.to_string(), 500)
            .expect("empty table has room");
    }
    table.start_hand().expect("three funded players");

    while let Some(user_id) = table.user_on_clock() {
        let owes = table
            .player(user_id)
            .is_some_and(|p| p.current_bet < table.current_bet());
        let action = if owes { Action::Call } else { Action::Check };
        table
            .apply_action(user_id, action)
            .expect("checking or calling is always legal");
        println!("user {user_id} chose to {action}");
    }

    if let Some(summary) = table.last_hand() {
        println!("Board: {}", format_cards(&summary.board));
        for shown in &summary.showdown {
            println!(
                "  user {} shows {} ({})",
                shown.user_id,
                format_cards(&shown.cards),
                shown.value.rank
            );
        }
        for payout in &summary.payouts {
            println!("  user {} wins {}", payout.user_id, payout.amount);
        }
    }

    println!("\n=== End of Hand Evaluation Example ===");
}

fn format_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
