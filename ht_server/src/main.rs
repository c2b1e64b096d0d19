//! Multi-table hold'em server.
//!
//! Each table runs as its own actor inside `TableRegistry`; this binary
//! wires accounts and persistence to Postgres when a database is
//! configured, and to memory otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use holdem_tables::{
    accounts::{AccountService, InMemoryAccounts, PgAccounts},
    db::{Database, InMemoryTableRepository, PgTableRepository, TableRepository},
    table::SubscriberNotifier,
};
use ht_server::{
    api,
    config::{DemoAccountsConfig, ServerConfig},
    logging,
};
use log::{error, info};
use pico_args::Arguments;

const HELP: &str = "\
Run a multi-table hold'em server

USAGE:
  ht_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL; in-memory when unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  TABLE_SPEED              Default table speed: normal, turbo or hyper
  TABLE_SMALL_BLIND        Default small blind
  TABLE_BIG_BLIND          Default big blind
  TABLE_MAX_BUY_IN         Default max buy-in
  DEMO_ACCOUNTS            In-memory accounts to create (users 1..=N)
  RUST_LOG                 Log filter (default: info,sqlx=warn,hyper=warn)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    info!("Starting multi-table hold'em server at {}", config.bind);

    let notifier = Arc::new(SubscriberNotifier::new());
    let (accounts, repository, database): (
        Arc<dyn AccountService>,
        Arc<dyn TableRepository>,
        Option<Database>,
    ) = match &config.database {
        Some(db_config) => {
            let db = Database::new(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            info!("Database connected successfully");
            (
                Arc::new(PgAccounts::new(db.pool().clone())),
                Arc::new(PgTableRepository::new(db.pool().clone())),
                Some(db),
            )
        }
        None => {
            info!("No DATABASE_URL set, keeping accounts and tables in memory");
            (
                Arc::new(demo_accounts(&config.demo_accounts)),
                Arc::new(InMemoryTableRepository::new()),
                None,
            )
        }
    };

    let state = api::AppState::new(
        accounts,
        repository,
        notifier,
        config.table_defaults.clone(),
        database,
    );

    match state.registry.load_existing_tables().await {
        Ok(restored) => info!("Restored {} table(s)", restored),
        Err(e) => error!("Failed to restore tables: {}", e),
    }

    for table in state.registry.list_tables().await {
        info!(
            "  - {} (ID: {}) - {}/{} players, blinds: {}/{}",
            table.name,
            table.table_id,
            table.player_count,
            table.max_players,
            table.small_blind,
            table.big_blind
        );
    }

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    Ok(())
}

fn demo_accounts(config: &DemoAccountsConfig) -> InMemoryAccounts {
    let accounts = InMemoryAccounts::new();
    for user_id in 1..=config.count {
        accounts.insert(
            user_id,
            &format!("player{user_id}@example.com"),
            &format!("player{user_id}"),
            config.starting_balance,
        );
    }
    info!(
        "Created {} demo account(s) with {} chips each",
        config.count, config.starting_balance
    );
    accounts
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
