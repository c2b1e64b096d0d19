//! Structured logging configuration.
//!
//! The table engine logs through the `log` facade; `tracing-subscriber`
//! picks those records up alongside the server's own `tracing` events.

use axum::http::StatusCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use ht_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a table command issued over HTTP or WebSocket
///
/// Failures the client caused are logged at debug, server faults at warn.
///
/// # Example
///
/// ```
/// use axum::http::StatusCode;
/// use ht_server::logging::log_table_command;
///
/// log_table_command("join", 1, 42, StatusCode::OK);
/// ```
pub fn log_table_command(command: &str, table_id: i64, user_id: i64, status: StatusCode) {
    if status.is_server_error() {
        tracing::warn!(
            command = command,
            table_id = table_id,
            user_id = user_id,
            status = status.as_u16(),
            "Table command failed"
        );
    } else {
        tracing::debug!(
            command = command,
            table_id = table_id,
            user_id = user_id,
            status = status.as_u16(),
            "Table command"
        );
    }
}
