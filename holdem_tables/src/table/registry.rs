//! Table registry for spawning and managing multiple table actors.

use super::{
    actor::{TableActor, TableHandle, TableServices},
    config::TableConfig,
    errors::{TableError, TableResult},
    messages::TableSummary,
};
use crate::{
    accounts::AccountError,
    db::{
        TableRecord,
        timeouts::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, with_timeout},
    },
    game::{
        GameError, Table,
        entities::{Action, PlayerTableView, SeatIndex, TableId, TableSnapshot, UserId},
    },
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, watch};

/// Process-wide map from table id to live table actors
pub struct TableRegistry {
    services: TableServices,

    /// Active table handles
    tables: Arc<RwLock<HashMap<TableId, TableHandle>>>,

    /// Next table ID
    next_table_id: Arc<RwLock<TableId>>,
}

impl TableRegistry {
    /// Create a new, empty registry
    ///
    /// # Arguments
    ///
    /// * `services` - Collaborators handed to every table actor
    pub fn new(services: TableServices) -> Self {
        Self {
            services,
            tables: Arc::new(RwLock::new(HashMap::new())),
            next_table_id: Arc::new(RwLock::new(1)),
        }
    }

    fn spawn(&self, config: TableConfig, table: Table) -> TableHandle {
        let (actor, handle) = TableActor::new(config, table, self.services.clone());
        tokio::spawn(async move {
            actor.run().await;
        });
        handle
    }

    /// Restore tables saved by an earlier process and spawn their actors
    ///
    /// Saved stacks are still escrowed, so restored players sit down with
    /// them as they are. Records without seated players are deleted, and so
    /// are records whose config no longer validates, once their stacks are
    /// back in the players' accounts. Updates next_table_id to be one more
    /// than the highest restored ID.
    ///
    /// # Returns
    ///
    /// * `TableResult<usize>` - Number of tables restored
    pub async fn load_existing_tables(&self) -> TableResult<usize> {
        let records = with_timeout(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.services.repository.list_tables(),
        )
        .await?;

        let mut max_id = 0;
        let mut loaded_count = 0;

        for record in records {
            max_id = max_id.max(record.table_id);

            if record.seats.is_empty() {
                log::info!("Dropping empty saved table {}", record.table_id);
                with_timeout(
                    DEFAULT_TRANSACTION_TIMEOUT,
                    self.services.repository.delete_table(record.table_id),
                )
                .await?;
                continue;
            }

            if let Err(reason) = record.config.validate() {
                log::warn!("Dropping saved table {}: {}", record.table_id, reason);
                self.refund_saved_seats(&record).await?;
                with_timeout(
                    DEFAULT_TRANSACTION_TIMEOUT,
                    self.services.repository.delete_table(record.table_id),
                )
                .await?;
                continue;
            }

            let table = Table::restore(
                record.table_id,
                record.config.settings(),
                record.seats,
                record.dealer_idx,
                record.hand_number,
            );
            let handle = self.spawn(record.config, table);
            self.tables.write().await.insert(record.table_id, handle);

            log::info!("Restored table {}", record.table_id);
            loaded_count += 1;
        }

        let mut next_id = self.next_table_id.write().await;
        *next_id = (*next_id).max(max_id + 1);
        drop(next_id);

        Ok(loaded_count)
    }

    /// Give every saved stack back to its owner. Keys are derived from the
    /// record, so a restart that repeats this doesn't pay twice.
    async fn refund_saved_seats(&self, record: &TableRecord) -> TableResult<()> {
        for seat in record.seats.iter().filter(|seat| seat.stack > 0) {
            let key = format!(
                "restore_refund_{}_{}_{}",
                record.table_id,
                seat.user_id,
                record.updated_at.timestamp_millis()
            );
            let result = with_timeout(
                DEFAULT_QUERY_TIMEOUT,
                self.services
                    .accounts
                    .adjust_balance(seat.user_id, seat.stack as i64, &key),
            )
            .await;
            match result {
                Ok(_) | Err(AccountError::DuplicateTransaction(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Create and spawn a new table with the host seated
    ///
    /// # Arguments
    ///
    /// * `host_user_id` - User creating the table; takes the first seat
    /// * `config` - Table configuration
    ///
    /// # Returns
    ///
    /// * `TableResult<TableId>` - Table ID, or why the table or the host's
    ///   seat couldn't be created
    pub async fn create_table(
        &self,
        host_user_id: UserId,
        config: TableConfig,
    ) -> TableResult<TableId> {
        config.validate().map_err(TableError::InvalidConfig)?;

        let mut next_id = self.next_table_id.write().await;
        let table_id = *next_id;
        *next_id += 1;
        drop(next_id);

        let table = Table::new(table_id, config.settings());
        let handle = self.spawn(config, table);

        if let Err(e) = handle.join(host_user_id).await {
            log::info!(
                "Host {} couldn't sit at new table {}: {}",
                host_user_id,
                table_id,
                e
            );
            let _ = handle.close().await;
            return Err(e);
        }

        self.tables.write().await.insert(table_id, handle);
        log::info!("Created table {} for host {}", table_id, host_user_id);

        Ok(table_id)
    }

    /// Get a live table handle. Handles of stopped actors are pruned.
    pub async fn get_table(&self, table_id: TableId) -> TableResult<TableHandle> {
        let handle = self.tables.read().await.get(&table_id).cloned();
        match handle {
            Some(handle) if !handle.is_closed() => Ok(handle),
            Some(_) => {
                self.tables.write().await.remove(&table_id);
                Err(GameError::TableNotFound(table_id).into())
            }
            None => Err(GameError::TableNotFound(table_id).into()),
        }
    }

    /// Seat a user, debiting the buy-in from their account balance
    pub async fn join_table(&self, table_id: TableId, user_id: UserId) -> TableResult<SeatIndex> {
        self.get_table(table_id).await?.join(user_id).await
    }

    /// Leave a table; the table is torn down once nobody is seated
    ///
    /// # Returns
    ///
    /// * `TableResult<usize>` - Players still seated
    pub async fn leave_table(&self, table_id: TableId, user_id: UserId) -> TableResult<usize> {
        let remaining = self.get_table(table_id).await?.leave(user_id).await?;
        if remaining == 0 {
            self.tables.write().await.remove(&table_id);
            log::info!("Table {} is empty and was removed", table_id);
        }
        Ok(remaining)
    }

    /// Deal the next hand at the request of a seated player
    pub async fn start_hand(&self, table_id: TableId, user_id: UserId) -> TableResult<()> {
        self.get_table(table_id).await?.start_hand(user_id).await
    }

    pub async fn player_action(
        &self,
        table_id: TableId,
        user_id: UserId,
        action: Action,
    ) -> TableResult<()> {
        self.get_table(table_id)
            .await?
            .take_action(user_id, action)
            .await
    }

    /// Latest public snapshot of a table
    pub async fn snapshot(&self, table_id: TableId) -> TableResult<Arc<TableSnapshot>> {
        Ok(self.get_table(table_id).await?.snapshot())
    }

    /// Snapshot plus the caller's own hole cards
    pub async fn player_view(
        &self,
        table_id: TableId,
        user_id: UserId,
    ) -> TableResult<PlayerTableView> {
        self.get_table(table_id).await?.player_view(user_id).await
    }

    /// Follow every snapshot a table publishes
    pub async fn watch_table(
        &self,
        table_id: TableId,
    ) -> TableResult<watch::Receiver<Arc<TableSnapshot>>> {
        Ok(self.get_table(table_id).await?.watch())
    }

    /// List all active tables, ordered by id
    pub async fn list_tables(&self) -> Vec<TableSummary> {
        let mut tables = self.tables.write().await;
        tables.retain(|_, handle| !handle.is_closed());

        let mut summaries: Vec<TableSummary> = tables
            .values()
            .map(|handle| {
                let config = handle.config();
                let snapshot = handle.snapshot();
                TableSummary {
                    table_id: handle.table_id(),
                    name: config.name.clone(),
                    player_count: snapshot.players.len(),
                    max_players: config.max_players,
                    small_blind: config.small_blind,
                    big_blind: config.big_blind,
                    max_buy_in: config.max_buy_in,
                    speed: config.speed,
                    round: snapshot.round,
                    hand_number: snapshot.hand_number,
                }
            })
            .collect();
        summaries.sort_by_key(|summary| summary.table_id);
        summaries
    }

    /// Close a table; a hand in progress is abandoned
    pub async fn close_table(&self, table_id: TableId) -> TableResult<()> {
        let handle = self.get_table(table_id).await?;
        let result = handle.close().await;
        self.tables.write().await.remove(&table_id);
        log::info!("Closed table {}", table_id);
        result
    }

    /// Get active table count
    pub async fn active_table_count(&self) -> usize {
        let tables = self.tables.read().await;
        tables.values().filter(|handle| !handle.is_closed()).count()
    }
}
