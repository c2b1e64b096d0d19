//! Table management API handlers.
//!
//! Every handler forwards to the [`TableRegistry`](holdem_tables::table::TableRegistry);
//! table actors do the work and the handlers only translate results to HTTP.
//!
//! # Examples
//!
//! List all tables:
//! ```bash
//! curl http://localhost:6969/api/v1/tables
//! ```
//!
//! Raise to 40:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/tables/1/action \
//!   -H "x-user-id: 42" \
//!   -H "Content-Type: application/json" \
//!   -d '{"action": {"type": "raise", "amount": 40}}'
//! ```

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use holdem_tables::{
    GameError,
    accounts::AccountError,
    entities::{Action, Chips, PlayerTableView, SeatIndex, TableId, TableSnapshot},
    table::{TableConfig, TableError, TableSpeed, TableSummary},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::logging::log_table_command;

/// Overrides applied on top of the server's table defaults
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateTableRequest {
    pub name: Option<String>,
    pub max_players: Option<usize>,
    pub small_blind: Option<Chips>,
    pub big_blind: Option<Chips>,
    pub max_buy_in: Option<Chips>,
    pub speed: Option<TableSpeed>,
    pub auto_start_next_hand: Option<bool>,
}

impl CreateTableRequest {
    fn into_config(self, defaults: &TableConfig) -> TableConfig {
        TableConfig {
            name: self.name.unwrap_or_else(|| defaults.name.clone()),
            max_players: self.max_players.unwrap_or(defaults.max_players),
            small_blind: self.small_blind.unwrap_or(defaults.small_blind),
            big_blind: self.big_blind.unwrap_or(defaults.big_blind),
            max_buy_in: self.max_buy_in.unwrap_or(defaults.max_buy_in),
            speed: self.speed.unwrap_or(defaults.speed),
            auto_start_next_hand: self
                .auto_start_next_hand
                .unwrap_or(defaults.auto_start_next_hand),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTableResponse {
    pub table_id: TableId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinTableResponse {
    pub seat_idx: SeatIndex,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaveTableResponse {
    pub remaining_players: usize,
}

/// Body of an action request, e.g. `{"action": {"type": "call"}}`
#[derive(Debug, Deserialize)]
pub struct TakeActionRequest {
    pub action: Action,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a table error
pub fn status_for(error: &TableError) -> StatusCode {
    match error {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        TableError::Game(e) if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
        TableError::Game(GameError::InvalidAction { .. })
        | TableError::InvalidConfig(_)
        | TableError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        TableError::Game(_) => StatusCode::CONFLICT,
        TableError::NotSeated { .. } => StatusCode::FORBIDDEN,
        TableError::Account(AccountError::UserNotFound(_)) => StatusCode::NOT_FOUND,
        TableError::Account(AccountError::InsufficientBalance { .. }) => StatusCode::BAD_REQUEST,
        TableError::Account(_)
        | TableError::Repository(_)
        | TableError::TableClosed(_)
        | TableError::CashOutPending { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(command: &str, table_id: TableId, user_id: i64, error: TableError) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("{} on table {} failed: {}", command, table_id, error);
    }
    log_table_command(command, table_id, user_id, status);
    (
        status,
        Json(ErrorResponse {
            error: error.client_message(),
        }),
    )
}

/// List all active tables, ordered by id.
///
/// Returns `200 OK` with an array of table summaries:
/// ```json
/// [
///   {
///     "table_id": 1,
///     "name": "High Stakes",
///     "player_count": 5,
///     "max_players": 9,
///     "small_blind": 10,
///     "big_blind": 20,
///     "max_buy_in": 2000,
///     "speed": "turbo",
///     "round": "flop",
///     "hand_number": 14
///   }
/// ]
/// ```
pub async fn list_tables(State(state): State<AppState>) -> Json<Vec<TableSummary>> {
    Json(state.registry.list_tables().await)
}

/// Create a table and seat the caller as its first player.
///
/// The body may override any of the server's table defaults; `{}` takes
/// them all.
///
/// # Errors
///
/// - `400 Bad Request`: Invalid config, or the host can't cover the big blind
/// - `404 Not Found`: The host has no account
pub async fn create_table(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Json(request): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<CreateTableResponse>), ApiError> {
    let config = request.into_config(&state.table_defaults);
    match state.registry.create_table(user_id, config).await {
        Ok(table_id) => {
            log_table_command("create", table_id, user_id, StatusCode::CREATED);
            Ok((StatusCode::CREATED, Json(CreateTableResponse { table_id })))
        }
        Err(e) => Err(api_error("create", 0, user_id, e)),
    }
}

/// Public snapshot of a table; no hole cards of anyone still in a hand.
///
/// # Errors
///
/// - `404 Not Found`: Table doesn't exist
pub async fn get_table(
    State(state): State<AppState>,
    Path(table_id): Path<TableId>,
) -> Result<Json<Arc<TableSnapshot>>, ApiError> {
    state
        .registry
        .snapshot(table_id)
        .await
        .map(Json)
        .map_err(|e| api_error("snapshot", table_id, 0, e))
}

/// The caller's view of a table: the public snapshot plus their own cards.
///
/// # Errors
///
/// - `404 Not Found`: Table doesn't exist or the caller isn't seated
pub async fn get_player_view(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(table_id): Path<TableId>,
) -> Result<Json<PlayerTableView>, ApiError> {
    state
        .registry
        .player_view(table_id, user_id)
        .await
        .map(Json)
        .map_err(|e| api_error("view", table_id, user_id, e))
}

/// Buy in and take a seat.
///
/// The stack brought to the table is the caller's balance capped at the
/// table's max buy-in, and it leaves the account until the caller leaves
/// the table.
///
/// # Errors
///
/// - `400 Bad Request`: Balance below the big blind
/// - `404 Not Found`: Table or account doesn't exist
/// - `409 Conflict`: Table full or caller already seated
pub async fn join_table(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(table_id): Path<TableId>,
) -> Result<Json<JoinTableResponse>, ApiError> {
    let seat_idx = state
        .registry
        .join_table(table_id, user_id)
        .await
        .map_err(|e| api_error("join", table_id, user_id, e))?;
    log_table_command("join", table_id, user_id, StatusCode::OK);
    Ok(Json(JoinTableResponse { seat_idx }))
}

/// Leave a table.
///
/// Leaving during a hand folds the caller; the seat frees up once the hand
/// is over. The table closes when its last player leaves.
///
/// # Errors
///
/// - `404 Not Found`: Table doesn't exist or the caller isn't seated
pub async fn leave_table(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(table_id): Path<TableId>,
) -> Result<Json<LeaveTableResponse>, ApiError> {
    let remaining_players = state
        .registry
        .leave_table(table_id, user_id)
        .await
        .map_err(|e| api_error("leave", table_id, user_id, e))?;
    log_table_command("leave", table_id, user_id, StatusCode::OK);
    Ok(Json(LeaveTableResponse { remaining_players }))
}

/// Deal the next hand.
///
/// # Errors
///
/// - `403 Forbidden`: Caller isn't seated at the table
/// - `409 Conflict`: A hand is already running or fewer than two players have chips
pub async fn start_hand(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(table_id): Path<TableId>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .start_hand(table_id, user_id)
        .await
        .map_err(|e| api_error("start", table_id, user_id, e))?;
    log_table_command("start", table_id, user_id, StatusCode::OK);
    Ok(StatusCode::OK)
}

/// Act on your turn.
///
/// **Fold:**
/// ```json
/// {"action": {"type": "fold"}}
/// ```
///
/// **Raise to 100 for this street:**
/// ```json
/// {"action": {"type": "raise", "amount": 100}}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Not your turn or the action isn't legal right now
/// - `404 Not Found`: Table doesn't exist or the caller isn't seated
pub async fn take_action(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(table_id): Path<TableId>,
    Json(request): Json<TakeActionRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .player_action(table_id, user_id, request.action)
        .await
        .map_err(|e| api_error("action", table_id, user_id, e))?;
    log_table_command("action", table_id, user_id, StatusCode::OK);
    Ok(StatusCode::OK)
}

/// Close a table. A hand in progress is abandoned and every seated player
/// gets back the stack they had when it was dealt.
///
/// # Errors
///
/// - `403 Forbidden`: Caller isn't seated at the table
/// - `404 Not Found`: Table doesn't exist
pub async fn close_table(
    State(state): State<AppState>,
    Extension(user_id): Extension<i64>,
    Path(table_id): Path<TableId>,
) -> Result<StatusCode, ApiError> {
    let snapshot = state
        .registry
        .snapshot(table_id)
        .await
        .map_err(|e| api_error("close", table_id, user_id, e))?;
    if !snapshot.players.iter().any(|p| p.user_id == user_id) {
        log_table_command("close", table_id, user_id, StatusCode::FORBIDDEN);
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Only seated players can close a table".to_string(),
            }),
        ));
    }

    state
        .registry
        .close_table(table_id)
        .await
        .map_err(|e| api_error("close", table_id, user_id, e))?;
    log_table_command("close", table_id, user_id, StatusCode::NO_CONTENT);
    Ok(StatusCode::NO_CONTENT)
}
