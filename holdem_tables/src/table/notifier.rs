//! Outbound notifications to connected viewers.
//!
//! Table actors call the [`Notifier`] after each completed mutation. Calls
//! never block: [`SubscriberNotifier`] pushes into bounded per-user
//! channels with `try_send` and drops messages for slow consumers.

use parking_lot::RwLock;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;

use crate::game::entities::{Card, HandSummary, TableId, TableSnapshot, UserId};

/// What a subscriber receives.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Public table state after a change
    Snapshot { snapshot: Arc<TableSnapshot> },
    /// The receiving player's hole cards for a new hand
    HoleCards { table_id: TableId, cards: Vec<Card> },
    /// Result of a finished hand, including any showdown reveals
    HandFinished {
        table_id: TableId,
        summary: Arc<HandSummary>,
    },
}

/// Sink for table updates.
pub trait Notifier: Send + Sync {
    /// Send the public snapshot to everyone watching the table
    fn broadcast(&self, table_id: TableId, snapshot: Arc<TableSnapshot>);

    /// Send hole cards to one player only
    fn send_private(&self, table_id: TableId, user_id: UserId, hole_cards: Vec<Card>);

    /// Announce a finished hand to everyone watching the table
    fn hand_finished(&self, table_id: TableId, summary: Arc<HandSummary>);

    /// The table stopped; nothing more will be sent for it
    fn table_closed(&self, _table_id: TableId) {}
}

type Subscribers = HashMap<UserId, mpsc::Sender<Notification>>;

/// Fans notifications out to channels registered per table and user.
#[derive(Default)]
pub struct SubscriberNotifier {
    tables: RwLock<HashMap<TableId, Subscribers>>,
}

impl SubscriberNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` for a table, replacing any earlier channel of the
    /// same user.
    pub fn subscribe(&self, table_id: TableId, user_id: UserId, sender: mpsc::Sender<Notification>) {
        self.tables
            .write()
            .entry(table_id)
            .or_default()
            .insert(user_id, sender);
        log::debug!("User {} subscribed to table {} updates", user_id, table_id);
    }

    pub fn unsubscribe(&self, table_id: TableId, user_id: UserId) {
        let mut tables = self.tables.write();
        if let Some(subscribers) = tables.get_mut(&table_id) {
            subscribers.remove(&user_id);
            if subscribers.is_empty() {
                tables.remove(&table_id);
            }
        }
        log::debug!("User {} unsubscribed from table {} updates", user_id, table_id);
    }

    /// Forget every subscriber of a table
    pub fn remove_table(&self, table_id: TableId) {
        self.tables.write().remove(&table_id);
    }

    pub fn subscriber_count(&self, table_id: TableId) -> usize {
        self.tables.read().get(&table_id).map_or(0, HashMap::len)
    }

    fn try_deliver(user_id: UserId, sender: &mpsc::Sender<Notification>, notification: Notification) -> bool {
        match sender.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Subscriber {} channel full, dropping notification", user_id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Subscriber {} disconnected, removing", user_id);
                false
            }
        }
    }

    fn fan_out(&self, table_id: TableId, notification: &Notification) {
        let mut tables = self.tables.write();
        if let Some(subscribers) = tables.get_mut(&table_id) {
            subscribers.retain(|&user_id, sender| {
                Self::try_deliver(user_id, sender, notification.clone())
            });
        }
    }
}

impl Notifier for SubscriberNotifier {
    fn broadcast(&self, table_id: TableId, snapshot: Arc<TableSnapshot>) {
        self.fan_out(table_id, &Notification::Snapshot { snapshot });
    }

    fn send_private(&self, table_id: TableId, user_id: UserId, hole_cards: Vec<Card>) {
        let mut tables = self.tables.write();
        let Some(subscribers) = tables.get_mut(&table_id) else {
            return;
        };
        let notification = Notification::HoleCards {
            table_id,
            cards: hole_cards,
        };
        let keep = match subscribers.get(&user_id) {
            Some(sender) => Self::try_deliver(user_id, sender, notification),
            None => true,
        };
        if !keep {
            subscribers.remove(&user_id);
        }
    }

    fn hand_finished(&self, table_id: TableId, summary: Arc<HandSummary>) {
        self.fan_out(table_id, &Notification::HandFinished { table_id, summary });
    }

    fn table_closed(&self, table_id: TableId) {
        self.remove_table(table_id);
    }
}
