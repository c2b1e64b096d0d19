//! The account service contract and an in-memory implementation.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::{
    errors::{AccountError, AccountResult},
    models::{Account, BalanceEntry},
};
use crate::game::entities::UserId;

/// Identity and balance lookups plus atomic balance changes.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Find an account by user ID
    async fn find_user_by_id(&self, user_id: UserId) -> AccountResult<Account>;

    /// Find an account by email
    async fn find_user_by_email(&self, email: &str) -> AccountResult<Account>;

    /// Add `delta` (negative to debit) to the user's balance in one atomic
    /// step. Fails without changing anything if the balance would drop
    /// below zero or the idempotency key was already used.
    ///
    /// Returns the new balance.
    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: i64,
        idempotency_key: &str,
    ) -> AccountResult<i64>;

    /// Count one more hand played, and one more won if `won`.
    async fn record_hand_result(&self, user_id: UserId, won: bool) -> AccountResult<()>;
}

#[derive(Default)]
struct Ledger {
    accounts: HashMap<UserId, Account>,
    entries: Vec<BalanceEntry>,
    used_keys: HashSet<String>,
}

/// Process-local accounts, for tests and single-node deployments without
/// a database.
#[derive(Default)]
pub struct InMemoryAccounts {
    ledger: Mutex<Ledger>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account.
    pub fn insert(&self, user_id: UserId, email: &str, display_name: &str, balance: i64) {
        let now = Utc::now();
        self.ledger.lock().accounts.insert(
            user_id,
            Account {
                user_id,
                email: email.to_string(),
                display_name: display_name.to_string(),
                balance,
                games_played: 0,
                games_won: 0,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn balance(&self, user_id: UserId) -> Option<i64> {
        self.ledger.lock().accounts.get(&user_id).map(|a| a.balance)
    }

    /// Balance changes for a user, oldest first.
    pub fn entries(&self, user_id: UserId) -> Vec<BalanceEntry> {
        self.ledger
            .lock()
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AccountService for InMemoryAccounts {
    async fn find_user_by_id(&self, user_id: UserId) -> AccountResult<Account> {
        self.ledger
            .lock()
            .accounts
            .get(&user_id)
            .cloned()
            .ok_or(AccountError::UserNotFound(user_id))
    }

    async fn find_user_by_email(&self, email: &str) -> AccountResult<Account> {
        self.ledger
            .lock()
            .accounts
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| AccountError::EmailNotFound(email.to_string()))
    }

    async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: i64,
        idempotency_key: &str,
    ) -> AccountResult<i64> {
        let mut ledger = self.ledger.lock();
        if ledger.used_keys.contains(idempotency_key) {
            return Err(AccountError::DuplicateTransaction(
                idempotency_key.to_string(),
            ));
        }

        let account = ledger
            .accounts
            .get_mut(&user_id)
            .ok_or(AccountError::UserNotFound(user_id))?;
        let new_balance = account
            .balance
            .checked_add(delta)
            .ok_or(AccountError::BalanceOverflow)?;
        if new_balance < 0 {
            return Err(AccountError::InsufficientBalance {
                user_id,
                available: account.balance,
                required: -delta,
            });
        }
        account.balance = new_balance;
        account.updated_at = Utc::now();

        ledger.used_keys.insert(idempotency_key.to_string());
        ledger.entries.push(BalanceEntry {
            user_id,
            delta,
            balance_after: new_balance,
            idempotency_key: idempotency_key.to_string(),
            created_at: Utc::now(),
        });
        Ok(new_balance)
    }

    async fn record_hand_result(&self, user_id: UserId, won: bool) -> AccountResult<()> {
        let mut ledger = self.ledger.lock();
        let account = ledger
            .accounts
            .get_mut(&user_id)
            .ok_or(AccountError::UserNotFound(user_id))?;
        account.games_played += 1;
        if won {
            account.games_won += 1;
        }
        account.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> InMemoryAccounts {
        let accounts = InMemoryAccounts::new();
        accounts.insert(1, "alice@example.com", "alice", 100);
        accounts
    }

    #[tokio::test]
    async fn test_find_user() {
        let accounts = accounts();
        assert_eq!(accounts.find_user_by_id(1).await.unwrap().display_name, "alice");
        assert_eq!(
            accounts
                .find_user_by_email("ALICE@example.com")
                .await
                .unwrap()
                .user_id,
            1
        );
        assert!(matches!(
            accounts.find_user_by_id(2).await,
            Err(AccountError::UserNotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_adjust_balance_never_below_zero() {
        let accounts = accounts();
        assert_eq!(accounts.adjust_balance(1, -60, "a").await.unwrap(), 40);
        assert!(matches!(
            accounts.adjust_balance(1, -41, "b").await,
            Err(AccountError::InsufficientBalance {
                available: 40,
                required: 41,
                ..
            })
        ));
        assert_eq!(accounts.balance(1), Some(40));
    }

    #[tokio::test]
    async fn test_adjust_balance_is_idempotent() {
        let accounts = accounts();
        accounts.adjust_balance(1, 25, "hand-1").await.unwrap();
        assert!(matches!(
            accounts.adjust_balance(1, 25, "hand-1").await,
            Err(AccountError::DuplicateTransaction(_))
        ));
        assert_eq!(accounts.balance(1), Some(125));
        assert_eq!(accounts.entries(1).len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_adjustment_leaves_key_unused() {
        let accounts = accounts();
        assert!(accounts.adjust_balance(1, -500, "buy-in").await.is_err());
        assert_eq!(accounts.adjust_balance(1, -50, "buy-in").await.unwrap(), 50);
        assert!(matches!(
            accounts.adjust_balance(2, 10, "buy-in").await,
            Err(AccountError::DuplicateTransaction(_))
        ));
    }

    #[tokio::test]
    async fn test_record_hand_result() {
        let accounts = accounts();
        accounts.record_hand_result(1, true).await.unwrap();
        accounts.record_hand_result(1, false).await.unwrap();
        let account = accounts.find_user_by_id(1).await.unwrap();
        assert_eq!(account.games_played, 2);
        assert_eq!(account.games_won, 1);
    }
}
