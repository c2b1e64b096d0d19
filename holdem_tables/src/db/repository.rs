//! Table persistence contract and its implementations.
//!
//! A [`TableRecord`] only holds between-hands state: the table's config,
//! who sits where with how many chips, the dealer button and the hand
//! counter. Cards and in-flight bets are never persisted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use thiserror::Error;

use super::timeouts::TimeoutError;
use crate::{
    game::{
        SeatedPlayer,
        entities::{BetRecord, SeatIndex, TableId},
    },
    table::config::TableConfig,
};

/// Persistence errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt table record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Everything needed to bring a table back between hands.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableRecord {
    pub table_id: TableId,
    pub config: TableConfig,
    pub seats: Vec<SeatedPlayer>,
    pub dealer_idx: SeatIndex,
    pub hand_number: u64,
    pub updated_at: DateTime<Utc>,
}

/// Trait for table persistence
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Load one table
    async fn load_table(&self, table_id: TableId) -> RepositoryResult<Option<TableRecord>>;

    /// Insert or replace a table
    async fn save_table(&self, record: &TableRecord) -> RepositoryResult<()>;

    /// Forget a table; deleting a missing table is not an error
    async fn delete_table(&self, table_id: TableId) -> RepositoryResult<()>;

    /// All stored tables, by id
    async fn list_tables(&self) -> RepositoryResult<Vec<TableRecord>>;

    /// Append audit records for blinds and actions
    async fn append_bets(&self, bets: &[BetRecord]) -> RepositoryResult<()>;
}

/// Process-local repository, for tests and deployments without a database.
#[derive(Default)]
pub struct InMemoryTableRepository {
    tables: Mutex<HashMap<TableId, TableRecord>>,
    bets: Mutex<Vec<BetRecord>>,
}

impl InMemoryTableRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every bet appended so far, oldest first.
    pub fn bets(&self) -> Vec<BetRecord> {
        self.bets.lock().clone()
    }
}

#[async_trait]
impl TableRepository for InMemoryTableRepository {
    async fn load_table(&self, table_id: TableId) -> RepositoryResult<Option<TableRecord>> {
        Ok(self.tables.lock().get(&table_id).cloned())
    }

    async fn save_table(&self, record: &TableRecord) -> RepositoryResult<()> {
        self.tables.lock().insert(record.table_id, record.clone());
        Ok(())
    }

    async fn delete_table(&self, table_id: TableId) -> RepositoryResult<()> {
        self.tables.lock().remove(&table_id);
        Ok(())
    }

    async fn list_tables(&self) -> RepositoryResult<Vec<TableRecord>> {
        let mut records: Vec<_> = self.tables.lock().values().cloned().collect();
        records.sort_by_key(|r| r.table_id);
        Ok(records)
    }

    async fn append_bets(&self, bets: &[BetRecord]) -> RepositoryResult<()> {
        self.bets.lock().extend_from_slice(bets);
        Ok(())
    }
}

/// PostgreSQL implementation of `TableRepository`. Records are stored as a
/// JSON document per table; bets go to an append-only table.
pub struct PgTableRepository {
    pool: PgPool,
}

impl PgTableRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TableRepository for PgTableRepository {
    async fn load_table(&self, table_id: TableId) -> RepositoryResult<Option<TableRecord>> {
        let row = sqlx::query("SELECT state FROM tables WHERE id = $1")
            .bind(table_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let state: String = row.get("state");
                Ok(Some(serde_json::from_str(&state)?))
            }
            None => Ok(None),
        }
    }

    async fn save_table(&self, record: &TableRecord) -> RepositoryResult<()> {
        let state = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO tables (id, name, state, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (id)
             DO UPDATE SET name = EXCLUDED.name, state = EXCLUDED.state, updated_at = NOW()",
        )
        .bind(record.table_id)
        .bind(&record.config.name)
        .bind(state)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_table(&self, table_id: TableId) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM tables WHERE id = $1")
            .bind(table_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tables(&self) -> RepositoryResult<Vec<TableRecord>> {
        let rows = sqlx::query("SELECT state FROM tables ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let state: String = row.get("state");
                serde_json::from_str(&state).map_err(RepositoryError::from)
            })
            .collect()
    }

    async fn append_bets(&self, bets: &[BetRecord]) -> RepositoryResult<()> {
        if bets.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for bet in bets {
            sqlx::query(
                "INSERT INTO bets (table_id, user_id, hand_number, round, kind, amount, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(bet.table_id)
            .bind(bet.user_id)
            .bind(bet.hand_number as i64)
            .bind(bet.round.to_string())
            .bind(bet.kind.to_string())
            .bind(bet.amount as i64)
            .bind(bet.created_at.naive_utc())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
