//! Table module providing multi-table support with async actor model.
//!
//! This module implements:
//! - TableActor: Async actor owning a single poker table
//! - TableRegistry: Map of live tables and the command surface clients use
//! - Notifier: Outbound snapshots, hole cards and hand results
//!
//! ## Architecture
//!
//! Each table runs in a separate Tokio task with an mpsc message inbox and is
//! the only writer of its game state. After every completed mutation the
//! actor publishes an `Arc<TableSnapshot>` on a watch channel, so readers
//! never queue behind the mailbox. The actor also owns the turn timer.
//!
//! ## Example
//!
//! ```no_run
//! use holdem_tables::{
//!     accounts::InMemoryAccounts,
//!     db::InMemoryTableRepository,
//!     table::{SubscriberNotifier, TableConfig, TableRegistry, TableServices},
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), holdem_tables::table::TableError> {
//! let accounts = Arc::new(InMemoryAccounts::new());
//! accounts.insert(1, "alice@example.com", "alice", 500);
//!
//! let registry = TableRegistry::new(TableServices {
//!     accounts,
//!     repository: Arc::new(InMemoryTableRepository::new()),
//!     notifier: Arc::new(SubscriberNotifier::new()),
//! });
//! let table_id = registry.create_table(1, TableConfig::default()).await?;
//! println!("{:?}", registry.snapshot(table_id).await?);
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod errors;
pub mod messages;
pub mod notifier;
pub mod registry;

pub use actor::{TableActor, TableHandle, TableServices};
pub use config::{TableConfig, TableSpeed};
pub use errors::{TableError, TableResult};
pub use messages::{TableMessage, TableSummary};
pub use notifier::{Notification, Notifier, SubscriberNotifier};
pub use registry::TableRegistry;
