//! PostgreSQL account service.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::{
    errors::{AccountError, AccountResult},
    models::Account,
    service::AccountService,
};
use crate::game::entities::UserId;

/// Accounts stored in the `accounts` table, with every balance change
/// written to `account_entries` under a unique idempotency key.
#[derive(Clone)]
pub struct PgAccounts {
    pool: PgPool,
}

impl PgAccounts {
    /// Create a new account service
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn account_from_row(row: &PgRow) -> Account {
        Account {
            user_id: row.get("user_id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
            balance: row.get("balance"),
            games_played: row.get("games_played"),
            games_won: row.get("games_won"),
            created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
            updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
        }
    }
}

#[async_trait]
impl AccountService for PgAccounts {
    async fn find_user_by_id(&self, user_id: UserId) -> AccountResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, display_name, balance, games_played, games_won,
                   created_at, updated_at
            FROM accounts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AccountError::UserNotFound(user_id))?;

        Ok(Self::account_from_row(&row))
    }

    async fn find_user_by_email(&self, email: &str) -> AccountResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, display_name, balance, games_played, games_won,
                   created_at, updated_at
            FROM accounts
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AccountError::EmailNotFound(email.to_string()))?;

        Ok(Self::account_from_row(&row))
    }

    /// # Errors
    ///
    /// * `AccountError::InsufficientBalance` - Balance would go negative
    /// * `AccountError::DuplicateTransaction` - Idempotency key already used
    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: i64,
        idempotency_key: &str,
    ) -> AccountResult<i64> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM account_entries WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(AccountError::DuplicateTransaction(
                idempotency_key.to_string(),
            ));
        }

        // Check and update in a single statement so concurrent adjustments
        // can't race the balance below zero.
        let updated = sqlx::query(
            "UPDATE accounts
             SET balance = balance + $1, updated_at = NOW()
             WHERE user_id = $2 AND balance + $1 >= 0
             RETURNING balance",
        )
        .bind(delta)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_balance: i64 = match updated {
            Some(row) => row.get("balance"),
            None => {
                let current = sqlx::query("SELECT balance FROM accounts WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&mut *tx)
                    .await?;

                return match current {
                    Some(row) => Err(AccountError::InsufficientBalance {
                        user_id,
                        available: row.get("balance"),
                        required: -delta,
                    }),
                    None => Err(AccountError::UserNotFound(user_id)),
                };
            }
        };

        sqlx::query(
            r#"
            INSERT INTO account_entries (user_id, delta, balance_after, idempotency_key)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .bind(new_balance)
        .bind(idempotency_key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(new_balance)
    }

    async fn record_hand_result(&self, user_id: UserId, won: bool) -> AccountResult<()> {
        let result = sqlx::query(
            "UPDATE accounts
             SET games_played = games_played + 1,
                 games_won = games_won + CASE WHEN $1 THEN 1 ELSE 0 END,
                 updated_at = NOW()
             WHERE user_id = $2",
        )
        .bind(won)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AccountError::UserNotFound(user_id));
        }
        Ok(())
    }
}
