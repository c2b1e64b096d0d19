//! Table actor implementation with async message handling.

use super::{
    config::TableConfig,
    errors::{TableError, TableResult},
    messages::TableMessage,
    notifier::Notifier,
};
use crate::{
    accounts::{AccountError, AccountService},
    db::{
        TableRecord, TableRepository,
        timeouts::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, with_timeout},
    },
    game::{
        ClockKey, GameError, GameEvent, GameResult, Table,
        entities::{
            Action, Chips, HandSummary, PlayerTableView, SeatIndex, TableId, TableSnapshot, UserId,
        },
    },
};
use chrono::Utc;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, sleep_until},
};
use uuid::Uuid;

/// External collaborators shared by every table actor.
#[derive(Clone)]
pub struct TableServices {
    pub accounts: Arc<dyn AccountService>,
    pub repository: Arc<dyn TableRepository>,
    pub notifier: Arc<dyn Notifier>,
}

/// Table actor handle for sending messages and reading snapshots
#[derive(Clone)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
    snapshot: watch::Receiver<Arc<TableSnapshot>>,
    table_id: TableId,
    config: Arc<TableConfig>,
}

impl TableHandle {
    /// Get table ID
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Latest published snapshot. Never waits on the actor.
    pub fn snapshot(&self) -> Arc<TableSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// A receiver that sees every snapshot published from now on
    pub fn watch(&self) -> watch::Receiver<Arc<TableSnapshot>> {
        self.snapshot.clone()
    }

    /// Whether the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the table
    pub async fn send(&self, message: TableMessage) -> TableResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| TableError::TableClosed(self.table_id))
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<TableResult<T>>) -> TableMessage,
    ) -> TableResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(message(tx)).await?;
        rx.await
            .map_err(|_| TableError::TableClosed(self.table_id))?
    }

    pub async fn join(&self, user_id: UserId) -> TableResult<SeatIndex> {
        self.request(|response| TableMessage::Join { user_id, response })
            .await
    }

    /// Returns how many players are still seated
    pub async fn leave(&self, user_id: UserId) -> TableResult<usize> {
        self.request(|response| TableMessage::Leave { user_id, response })
            .await
    }

    pub async fn start_hand(&self, user_id: UserId) -> TableResult<()> {
        self.request(|response| TableMessage::StartHand { user_id, response })
            .await
    }

    pub async fn take_action(&self, user_id: UserId, action: Action) -> TableResult<()> {
        self.request(|response| TableMessage::TakeAction {
            user_id,
            action,
            response,
        })
        .await
    }

    pub async fn player_view(&self, user_id: UserId) -> TableResult<PlayerTableView> {
        self.request(|response| TableMessage::GetPlayerView { user_id, response })
            .await
    }

    pub async fn close(&self) -> TableResult<()> {
        self.request(|response| TableMessage::Close { response })
            .await
    }
}

/// Chips a failed transfer still owes an account. Retried with the same
/// idempotency key.
#[derive(Debug)]
struct CashOut {
    user_id: UserId,
    amount: Chips,
    key: String,
}

/// Table actor owning a single table
///
/// Stacks are escrowed: a buy-in leaves the account when the player sits
/// down and whatever is in front of them goes back when they leave or the
/// table shuts down.
pub struct TableActor {
    /// Table ID
    id: TableId,

    /// Table configuration
    config: TableConfig,

    /// Game state; this actor is its only writer
    table: Table,

    /// Message inbox
    inbox: mpsc::Receiver<TableMessage>,

    /// Publishes a fresh snapshot after every completed mutation
    snapshot: watch::Sender<Arc<TableSnapshot>>,

    services: TableServices,

    /// Current turn and when it runs out
    clock: Option<(ClockKey, Instant)>,

    unpaid: Vec<CashOut>,

    /// Is table closed
    is_closed: bool,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl TableActor {
    /// Create a new table actor
    ///
    /// # Arguments
    ///
    /// * `config` - Table configuration
    /// * `table` - Game state to drive, fresh or restored
    /// * `services` - Accounts, persistence and notifications
    ///
    /// # Returns
    ///
    /// * `(TableActor, TableHandle)` - Actor and handle for sending messages
    pub fn new(config: TableConfig, table: Table, services: TableServices) -> (Self, TableHandle) {
        let id = table.table_id();
        let (sender, inbox) = mpsc::channel(100);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(table.snapshot()));

        let handle = TableHandle {
            sender,
            snapshot: snapshot_rx,
            table_id: id,
            config: Arc::new(config.clone()),
        };

        let actor = Self {
            id,
            config,
            table,
            inbox,
            snapshot: snapshot_tx,
            services,
            clock: None,
            unpaid: Vec::new(),
            is_closed: false,
        };

        (actor, handle)
    }

    /// Run the table actor event loop
    pub async fn run(mut self) {
        log::info!("Table {} '{}' starting", self.id, self.config.name);
        self.sync_clock();

        loop {
            let deadline = self.clock.map(|(_, deadline)| deadline);
            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    // Every handle is gone
                    None => break,
                },

                () = wait_until(deadline) => {
                    if let Some((key, _)) = self.clock.take() {
                        self.handle_clock_expired(key).await;
                    }
                }
            }

            if self.is_closed {
                break;
            }
        }

        self.retry_unpaid().await;
        for owed in &self.unpaid {
            log::error!(
                "Table {}: {} chips owed to user {} were never returned (key {})",
                self.id,
                owed.amount,
                owed.user_id,
                owed.key
            );
        }

        log::info!("Table {} '{}' closed", self.id, self.config.name);
    }

    /// Handle a table message
    async fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::Join { user_id, response } => {
                let result = self.handle_join(user_id).await;
                let _ = response.send(result);
            }

            TableMessage::Leave { user_id, response } => {
                let result = self.handle_leave(user_id).await;
                let _ = response.send(result);
            }

            TableMessage::StartHand { user_id, response } => {
                let result = if self.table.player(user_id).is_none() {
                    Err(TableError::NotSeated {
                        table_id: self.id,
                        user_id,
                    })
                } else {
                    self.mutate(Table::start_hand).await
                };
                let _ = response.send(result);
            }

            TableMessage::TakeAction {
                user_id,
                action,
                response,
            } => {
                let result = self
                    .mutate(|table| table.apply_action(user_id, action))
                    .await;
                if let Err(e) = &result {
                    log::debug!("Table {}: rejected action from user {}: {}", self.id, user_id, e);
                }
                let _ = response.send(result);
            }

            TableMessage::GetPlayerView { user_id, response } => {
                let _ = response.send(self.table.view_for(user_id).map_err(TableError::from));
            }

            TableMessage::Close { response } => {
                self.shut_down("closed by request").await;
                let _ = response.send(Ok(()));
            }
        }
    }

    /// Run a game command. Rejected commands leave nothing to publish
    /// unless they froze the table.
    async fn mutate<T>(
        &mut self,
        command: impl FnOnce(&mut Table) -> GameResult<T>,
    ) -> TableResult<T> {
        let was_frozen = self.table.is_frozen();
        let result = command(&mut self.table);
        if result.is_ok() || self.table.is_frozen() != was_frozen {
            self.after_mutation().await;
        }
        result.map_err(TableError::from)
    }

    /// Handle join table request
    ///
    /// The buy-in is debited before the seat is taken and refunded if
    /// seating fails.
    async fn handle_join(&mut self, user_id: UserId) -> TableResult<SeatIndex> {
        if self.table.player(user_id).is_some() {
            return Err(GameError::AlreadySeated(user_id).into());
        }

        let account = with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            self.services.accounts.find_user_by_id(user_id),
        )
        .await?;

        let big_blind = self.config.big_blind;
        let balance = Chips::try_from(account.balance).unwrap_or(0);
        if balance < big_blind {
            return Err(TableError::InsufficientBalance {
                required: big_blind,
                available: account.balance,
            });
        }

        // Never more than the balance, so it fits an i64.
        let stack = balance.min(self.config.max_buy_in);
        let buy_in_key = format!("buyin_{}_{}_{}", self.id, user_id, Uuid::new_v4());
        self.transfer(user_id, -(stack as i64), &buy_in_key)
            .await
            .map_err(|e| match e {
                // Another table took the balance since it was read
                TableError::Account(AccountError::InsufficientBalance { available, .. }) => {
                    TableError::InsufficientBalance {
                        required: big_blind,
                        available,
                    }
                }
                e => e,
            })?;

        match self.table.seat_player(user_id, account.display_name, stack) {
            Ok(seat_idx) => {
                log::info!(
                    "Table {}: user {} sat down in seat {} with {} chips",
                    self.id,
                    user_id,
                    seat_idx,
                    stack
                );
                self.after_mutation().await;
                Ok(seat_idx)
            }
            Err(e) => {
                let refund_key = format!("{buy_in_key}_refund");
                if let Err(refund_err) = self.transfer(user_id, stack as i64, &refund_key).await {
                    log::error!(
                        "Table {}: failed to refund {} chips to user {}: {}",
                        self.id,
                        stack,
                        user_id,
                        refund_err
                    );
                    self.unpaid.push(CashOut {
                        user_id,
                        amount: stack,
                        key: refund_key,
                    });
                }
                Err(e.into())
            }
        }
    }

    /// Handle leave table request
    ///
    /// Between hands the stack goes back right away; a player leaving
    /// mid-hand is paid out once the hand is over.
    async fn handle_leave(&mut self, user_id: UserId) -> TableResult<usize> {
        self.table.unseat_player(user_id)?;
        self.after_mutation().await;
        if let Some(owed) = self.unpaid.iter().find(|owed| owed.user_id == user_id) {
            return Err(TableError::CashOutPending {
                user_id,
                amount: owed.amount,
            });
        }
        Ok(self.table.num_players())
    }

    async fn transfer(&self, user_id: UserId, delta: i64, key: &str) -> TableResult<i64> {
        Ok(with_timeout(
            DEFAULT_QUERY_TIMEOUT,
            self.services.accounts.adjust_balance(user_id, delta, key),
        )
        .await?)
    }

    /// Return a stack to its owner's account. A failed transfer is kept
    /// and retried after the next mutation.
    async fn cash_out(&mut self, user_id: UserId, amount: Chips) {
        if amount == 0 {
            return;
        }
        let key = format!("cashout_{}_{}_{}", self.id, user_id, Uuid::new_v4());
        match self.transfer(user_id, amount as i64, &key).await {
            Ok(balance) => log::info!(
                "Table {}: returned {} chips to user {} (balance {})",
                self.id,
                amount,
                user_id,
                balance
            ),
            Err(e) => {
                log::error!(
                    "Table {}: failed to return {} chips to user {}: {}",
                    self.id,
                    amount,
                    user_id,
                    e
                );
                self.unpaid.push(CashOut {
                    user_id,
                    amount,
                    key,
                });
            }
        }
    }

    async fn retry_unpaid(&mut self) {
        for owed in std::mem::take(&mut self.unpaid) {
            match self
                .transfer(owed.user_id, owed.amount as i64, &owed.key)
                .await
            {
                // A duplicate key means an earlier attempt went through
                Ok(_) | Err(TableError::Account(AccountError::DuplicateTransaction(_))) => {
                    log::info!(
                        "Table {}: returned {} owed chips to user {}",
                        self.id,
                        owed.amount,
                        owed.user_id
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Table {}: still can't return {} chips to user {}: {}",
                        self.id,
                        owed.amount,
                        owed.user_id,
                        e
                    );
                    self.unpaid.push(owed);
                }
            }
        }
    }

    async fn handle_clock_expired(&mut self, key: ClockKey) {
        if self.table.clock_key() != Some(key) {
            log::debug!("Table {}: discarding stale turn timer {:?}", self.id, key);
            self.sync_clock();
            return;
        }

        match self.table.act_on_timeout() {
            Ok(Some((user_id, action))) => {
                log::info!(
                    "Table {}: user {} ran out of time and will {}",
                    self.id,
                    user_id,
                    action
                );
            }
            Ok(None) => {}
            Err(e) => log::error!("Table {}: timeout action failed: {}", self.id, e),
        }
        self.after_mutation().await;
    }

    /// Re-key the turn timer to whoever is on the clock now. An unchanged
    /// turn keeps its deadline.
    fn sync_clock(&mut self) {
        self.clock = match self.table.clock_key() {
            Some(key) => match self.clock {
                Some((current, deadline)) if current == key => Some((current, deadline)),
                _ => Some((key, Instant::now() + self.config.action_timeout())),
            },
            None => None,
        };
    }

    /// Everything that follows a completed mutation: record finished hands,
    /// write the audit trail, persist seats, pay out leavers, publish and
    /// notify.
    async fn after_mutation(&mut self) {
        self.retry_unpaid().await;

        let events = self.table.drain_events();
        let mut dealt = false;
        let mut seats_changed = false;
        let mut leaving = Vec::new();

        for event in &events {
            log::debug!("Table {}: {}", self.id, event);
            match event {
                GameEvent::HandStarted { .. } => dealt = true,
                GameEvent::HandFinished(summary) => {
                    self.record_results(summary).await;
                    self.services
                        .notifier
                        .hand_finished(self.id, Arc::new(summary.as_ref().clone()));
                    seats_changed = true;
                }
                GameEvent::Joined { .. } => seats_changed = true,
                GameEvent::Left { user_id, stack } => {
                    leaving.push((*user_id, *stack));
                    seats_changed = true;
                }
                _ => {}
            }
        }

        self.flush_bets().await;

        // The saved seats drop leavers before their chips go back, so a
        // restart can't seat them with chips they already took.
        if self.table.is_empty() {
            self.shut_down("last player left").await;
        } else if seats_changed {
            self.persist().await;
        }

        for (user_id, stack) in leaving {
            self.cash_out(user_id, stack).await;
        }

        if self.is_closed {
            return;
        }

        self.publish();

        if dealt {
            for player in self.table.players().iter().filter(|p| !p.cards.is_empty()) {
                self.services
                    .notifier
                    .send_private(self.id, player.user_id, player.cards.clone());
            }
        }

        self.sync_clock();
    }

    /// Count a finished hand on every dealt-in player's account. Chips
    /// already moved between escrowed stacks at pot distribution.
    async fn record_results(&self, summary: &HandSummary) {
        for result in &summary.results {
            if let Err(e) = with_timeout(
                DEFAULT_QUERY_TIMEOUT,
                self.services
                    .accounts
                    .record_hand_result(result.user_id, result.won > 0),
            )
            .await
            {
                log::warn!(
                    "Table {}: failed to record hand result for user {}: {}",
                    self.id,
                    result.user_id,
                    e
                );
            }
        }
    }

    async fn flush_bets(&mut self) {
        let bets = self.table.drain_bets();
        if bets.is_empty() {
            return;
        }
        if let Err(e) = with_timeout(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.services.repository.append_bets(&bets),
        )
        .await
        {
            log::error!(
                "Table {}: failed to write {} bet records: {}",
                self.id,
                bets.len(),
                e
            );
        }
    }

    async fn persist(&self) {
        let record = TableRecord {
            table_id: self.id,
            config: self.config.clone(),
            seats: self.table.seats(),
            dealer_idx: self.table.dealer_idx(),
            hand_number: self.table.hand_number(),
            updated_at: Utc::now(),
        };
        if let Err(e) = with_timeout(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.services.repository.save_table(&record),
        )
        .await
        {
            log::error!("Table {}: failed to persist table: {}", self.id, e);
        }
    }

    fn publish(&self) {
        let snapshot = Arc::new(self.table.snapshot());
        self.snapshot.send_replace(snapshot.clone());
        self.services.notifier.broadcast(self.id, snapshot);
    }

    /// Stop the table for good and forget its persisted record. A hand in
    /// progress is abandoned: everyone gets back what they had when it was
    /// dealt.
    async fn shut_down(&mut self, reason: &str) {
        log::info!("Table {}: shutting down ({})", self.id, reason);
        self.table.close();
        self.clock = None;
        if let Err(e) = with_timeout(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.services.repository.delete_table(self.id),
        )
        .await
        {
            log::error!("Table {}: failed to delete table record: {}", self.id, e);
        }

        let stacks: Vec<(UserId, Chips)> = self
            .table
            .players()
            .iter()
            .map(|p| (p.user_id, p.stack + p.contributed))
            .collect();
        for (user_id, stack) in stacks {
            self.cash_out(user_id, stack).await;
        }

        self.publish();
        self.services.notifier.table_closed(self.id);
        self.is_closed = true;
    }
}
