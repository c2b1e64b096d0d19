//! Player accounts: balances and hand statistics.
//!
//! A table actor debits the buy-in through an [`AccountService`] when a
//! player sits down and credits the stack back when they leave or the
//! table shuts down, each transfer under its own idempotency key. Hands in
//! between only move chips among the escrowed stacks.
//!
//! ## Example
//!
//! ```
//! use holdem_tables::accounts::{AccountService, InMemoryAccounts};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let accounts = InMemoryAccounts::new();
//!     accounts.insert(1, "alice@example.com", "alice", 500);
//!
//!     let balance = accounts.adjust_balance(1, -40, "hand-1-user-1").await?;
//!     assert_eq!(balance, 460);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod models;
pub mod postgres;
pub mod service;

pub use errors::{AccountError, AccountResult};
pub use models::{Account, BalanceEntry};
pub use postgres::PgAccounts;
pub use service::{AccountService, InMemoryAccounts};
