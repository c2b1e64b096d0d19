//! HTTP/WebSocket API for the table server.
//!
//! # Endpoints Overview
//!
//! ## Tables
//! - `GET /api/v1/tables` - List all tables (public)
//! - `POST /api/v1/tables` - Create a table and sit down as host
//! - `GET /api/v1/tables/{id}` - Public snapshot of a table
//! - `GET /api/v1/tables/{id}/me` - Snapshot plus the caller's hole cards
//! - `POST /api/v1/tables/{id}/join` - Buy in and take a seat
//! - `POST /api/v1/tables/{id}/leave` - Leave the table
//! - `POST /api/v1/tables/{id}/start` - Deal the next hand
//! - `POST /api/v1/tables/{id}/action` - Act on your turn
//! - `DELETE /api/v1/tables/{id}` - Close the table
//!
//! ## WebSocket
//! - `GET /ws/{table_id}?user_id=<id>` - Live snapshots, hole cards and hand results
//!
//! ## Health Check
//! - `GET /health` - Server health status
//!
//! Callers identify themselves with the `x-user-id` header; authentication
//! happens in front of this service.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ht_server::api::{AppState, create_router};
//! use holdem_tables::{
//!     accounts::InMemoryAccounts,
//!     db::InMemoryTableRepository,
//!     table::{SubscriberNotifier, TableConfig},
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::new(
//!     Arc::new(InMemoryAccounts::new()),
//!     Arc::new(InMemoryTableRepository::new()),
//!     Arc::new(SubscriberNotifier::new()),
//!     TableConfig::default(),
//!     None,
//! );
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod middleware;
pub mod tables;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use holdem_tables::{
    accounts::AccountService,
    db::{Database, TableRepository},
    table::{SubscriberNotifier, TableConfig, TableRegistry, TableServices},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    /// Live tables
    pub registry: Arc<TableRegistry>,
    /// WebSocket subscriptions; also the notifier every table actor reports to
    pub notifier: Arc<SubscriberNotifier>,
    /// Fills in whatever a create request leaves out
    pub table_defaults: Arc<TableConfig>,
    /// Present when running against Postgres
    pub database: Option<Database>,
}

impl AppState {
    /// Wire a registry to its collaborators
    pub fn new(
        accounts: Arc<dyn AccountService>,
        repository: Arc<dyn TableRepository>,
        notifier: Arc<SubscriberNotifier>,
        table_defaults: TableConfig,
        database: Option<Database>,
    ) -> Self {
        let services = TableServices {
            accounts,
            repository,
            notifier: notifier.clone(),
        };
        Self {
            registry: Arc::new(TableRegistry::new(services)),
            notifier,
            table_defaults: Arc::new(table_defaults),
            database,
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET    /health                         - Health check (public)
/// GET    /api/v1/tables                  - List tables (public)
/// POST   /api/v1/tables                  - Create table (identity required)
/// GET    /api/v1/tables/{id}             - Table snapshot (public)
/// GET    /api/v1/tables/{id}/me          - Player view (identity required)
/// POST   /api/v1/tables/{id}/join        - Join table (identity required)
/// POST   /api/v1/tables/{id}/leave       - Leave table (identity required)
/// POST   /api/v1/tables/{id}/start       - Start hand (identity required)
/// POST   /api/v1/tables/{id}/action      - Take action (identity required)
/// DELETE /api/v1/tables/{id}             - Close table (identity required)
/// GET    /ws/{table_id}?user_id=<id>     - WebSocket
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router();

    // WebSocket route identifies the user via query parameter
    let root_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ws/{table_id}", get(websocket::websocket_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", v1_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    let public_routes = Router::new()
        .route("/tables", get(tables::list_tables))
        .route("/tables/{table_id}", get(tables::get_table));

    let protected_routes = Router::new()
        .route("/tables", post(tables::create_table))
        .route(
            "/tables/{table_id}",
            axum::routing::delete(tables::close_table),
        )
        .route("/tables/{table_id}/me", get(tables::get_player_view))
        .route("/tables/{table_id}/join", post(tables::join_table))
        .route("/tables/{table_id}/leave", post(tables::leave_table))
        .route("/tables/{table_id}/start", post(tables::start_hand))
        .route("/tables/{table_id}/action", post(tables::take_action))
        .layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the database (when configured) answers, or
/// `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","database":null,"tables":{"active_count":2},"timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(database) => Some(database.health_check().await.is_ok()),
        None => None,
    };
    let table_count = state.registry.active_table_count().await;
    let healthy = db_healthy.unwrap_or(true);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "tables": {
            "active_count": table_count
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
