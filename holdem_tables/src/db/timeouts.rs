//! Timeout helpers for calls to external collaborators
//!
//! Account and persistence calls made from a table actor are bounded so a
//! slow database can't stall a table indefinitely.

use std::{future::Future, time::Duration};
use tokio::time::timeout;

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for timeout operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Operation timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Run `future`, failing with the caller's error type if it takes longer
/// than `duration`.
///
/// # Example
///
/// ```
/// use holdem_tables::accounts::{AccountError, AccountService, InMemoryAccounts};
/// use holdem_tables::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), AccountError> {
/// let accounts = InMemoryAccounts::new();
/// accounts.insert(1, "bob@example.com", "bob", 100);
/// let account = with_timeout(DEFAULT_QUERY_TIMEOUT, accounts.find_user_by_id(1)).await?;
/// assert_eq!(account.balance, 100);
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(TimeoutError(duration).into()),
    }
}

/// Run `future` with the default query timeout (5 seconds)
pub async fn with_default_timeout<F, T, E>(future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TimeoutError>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}
