//! WebSocket handler for real-time table updates.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{table_id}?user_id=<id>`
//! 2. The connection subscribes to the table's notifications and receives
//!    the current snapshot, plus its hole cards when a hand is running
//! 3. Every change the table actor publishes is pushed as it happens
//! 4. Client commands are answered with a success or error response
//! 5. On disconnect the subscription is dropped; the seat is kept and the
//!    turn timer acts for an absent player
//!
//! # Server Messages
//!
//! - `{"type": "snapshot", "snapshot": {...}}` - public table state
//! - `{"type": "hole_cards", "table_id": 1, "cards": [...]}` - only to their owner
//! - `{"type": "hand_finished", "table_id": 1, "summary": {...}}` - results and reveals
//! - `{"type": "success" | "error", "message": "..."}` - command responses
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/1?user_id=42');
//!
//! ws.send(JSON.stringify({
//!   type: "action",
//!   action: { type: "raise", amount: 100 }
//! }));
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use holdem_tables::{
    entities::{Action, TableId, UserId},
    table::Notification,
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::AppState;
use crate::logging::log_table_command;

/// Queued notifications per connection before the notifier starts dropping
const NOTIFICATION_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    user_id: UserId,
}

/// Client messages received via WebSocket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Buy in and take a seat
    Join,
    /// Leave the table
    Leave,
    /// Deal the next hand
    Start,
    /// Act on your turn
    Action { action: Action },
}

/// Response messages sent to client
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerResponse {
    Success { message: String },
    Error { message: String },
}

/// Upgrade HTTP connection to WebSocket for a table's live updates.
///
/// # Response
///
/// - `101 Switching Protocols` on success
/// - `401 Unauthorized` for a missing or non-positive `user_id`
/// - `404 Not Found` when the table doesn't exist
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(table_id): Path<TableId>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let user_id = query.user_id;
    if user_id <= 0 {
        return (StatusCode::UNAUTHORIZED, "Invalid user id").into_response();
    }

    if state.registry.snapshot(table_id).await.is_err() {
        return (StatusCode::NOT_FOUND, "Table not found").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, table_id, user_id, state))
}

/// Handle an established WebSocket connection.
///
/// One task forwards notifications and command responses to the client;
/// the other reads client commands. Whichever ends first ends both.
async fn handle_socket(socket: WebSocket, table_id: TableId, user_id: UserId, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    info!("WebSocket connected: table={}, user={}", table_id, user_id);

    let (response_tx, mut response_rx) = mpsc::channel::<String>(32);
    let (notification_tx, mut notification_rx) = mpsc::channel(NOTIFICATION_BUFFER);
    state.notifier.subscribe(table_id, user_id, notification_tx);

    for notification in initial_notifications(&state, table_id, user_id).await {
        if let Some(json) = to_json(&notification) {
            let _ = response_tx.send(json).await;
        }
    }

    let mut send_task = tokio::spawn(async move {
        loop {
            let json = tokio::select! {
                notification = notification_rx.recv() => match notification {
                    Some(notification) => to_json(&notification),
                    None => {
                        // The table closed and dropped its subscribers
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                },
                response = response_rx.recv() => match response {
                    Some(json) => Some(json),
                    None => break,
                },
            };

            if let Some(json) = json
                && sender.send(Message::Text(json.into())).await.is_err()
            {
                break;
            }
        }
    });

    let receive_state = state.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    debug!("Received message from user {}: {}", user_id, text);

                    let response = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            handle_client_message(client_msg, table_id, user_id, &receive_state)
                                .await
                        }
                        Err(e) => {
                            warn!("Failed to parse client message: {}", e);
                            ServerResponse::Error {
                                message: "Invalid message format".to_string(),
                            }
                        }
                    };

                    if let Some(json) = to_json(&response)
                        && response_tx.send(json).await.is_err()
                    {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket closed: table={}, user={}", table_id, user_id);
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    state.notifier.unsubscribe(table_id, user_id);
    info!(
        "WebSocket disconnected: table={}, user={}",
        table_id, user_id
    );
}

/// What a fresh connection needs to render the table: the public
/// snapshot, and the caller's hole cards when they're in a hand.
async fn initial_notifications(
    state: &AppState,
    table_id: TableId,
    user_id: UserId,
) -> Vec<Notification> {
    let Ok(snapshot) = state.registry.snapshot(table_id).await else {
        return Vec::new();
    };
    let mut notifications = vec![Notification::Snapshot { snapshot }];

    if let Ok(view) = state.registry.player_view(table_id, user_id).await
        && !view.hole_cards.is_empty()
    {
        notifications.push(Notification::HoleCards {
            table_id,
            cards: view.hole_cards,
        });
    }
    notifications
}

fn to_json<T: Serialize>(message: &T) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize WebSocket message: {}", e);
            None
        }
    }
}

/// Run a client command against the table and describe the outcome.
pub async fn handle_client_message(
    msg: ClientMessage,
    table_id: TableId,
    user_id: UserId,
    state: &AppState,
) -> ServerResponse {
    let (command, result) = match msg {
        ClientMessage::Join => (
            "join",
            state
                .registry
                .join_table(table_id, user_id)
                .await
                .map(|seat_idx| format!("Seated at seat {seat_idx}")),
        ),
        ClientMessage::Leave => (
            "leave",
            state
                .registry
                .leave_table(table_id, user_id)
                .await
                .map(|_| "Left table".to_string()),
        ),
        ClientMessage::Start => (
            "start",
            state
                .registry
                .start_hand(table_id, user_id)
                .await
                .map(|()| "Hand started".to_string()),
        ),
        ClientMessage::Action { action } => (
            "action",
            state
                .registry
                .player_action(table_id, user_id, action)
                .await
                .map(|()| format!("You chose to {action}")),
        ),
    };

    match result {
        Ok(message) => {
            log_table_command(command, table_id, user_id, StatusCode::OK);
            ServerResponse::Success { message }
        }
        Err(e) => {
            log_table_command(command, table_id, user_id, super::tables::status_for(&e));
            ServerResponse::Error {
                message: e.client_message(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_tables::{
        accounts::InMemoryAccounts,
        db::InMemoryTableRepository,
        entities::Round,
        table::{SubscriberNotifier, TableConfig},
    };
    use std::sync::Arc;

    async fn state_with_table() -> (AppState, TableId) {
        let accounts = Arc::new(InMemoryAccounts::new());
        accounts.insert(1, "one@example.com", "one", 1000);
        accounts.insert(2, "two@example.com", "two", 1000);
        let state = AppState::new(
            accounts,
            Arc::new(InMemoryTableRepository::new()),
            Arc::new(SubscriberNotifier::new()),
            TableConfig {
                auto_start_next_hand: false,
                ..TableConfig::default()
            },
            None,
        );
        let table_id = state
            .registry
            .create_table(1, (*state.table_defaults).clone())
            .await
            .unwrap();
        (state, table_id)
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"action","action":{"type":"raise","amount":30}}"#)
                .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Action {
                action: Action::Raise(30)
            }
        ));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"spectate"}"#).is_err());
    }

    #[test]
    fn test_server_response_shape() {
        let json = serde_json::to_string(&ServerResponse::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"error","message":"nope"}"#);
    }

    #[tokio::test]
    async fn test_join_start_and_act() {
        let (state, table_id) = state_with_table().await;

        let response = handle_client_message(ClientMessage::Join, table_id, 2, &state).await;
        assert_eq!(
            response,
            ServerResponse::Success {
                message: "Seated at seat 1".to_string()
            }
        );

        let response = handle_client_message(ClientMessage::Start, table_id, 2, &state).await;
        assert!(matches!(response, ServerResponse::Success { .. }));

        let snapshot = state.registry.snapshot(table_id).await.unwrap();
        let on_clock = snapshot.player_on_clock.unwrap();
        let user_id = snapshot.players[on_clock].user_id;
        let response = handle_client_message(
            ClientMessage::Action {
                action: Action::Fold,
            },
            table_id,
            user_id,
            &state,
        )
        .await;
        assert_eq!(
            response,
            ServerResponse::Success {
                message: "You chose to fold".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_errors_are_reported_to_client() {
        let (state, table_id) = state_with_table().await;

        let response = handle_client_message(ClientMessage::Start, table_id, 1, &state).await;
        assert!(matches!(response, ServerResponse::Error { .. }));

        let response = handle_client_message(ClientMessage::Join, table_id, 99, &state).await;
        assert_eq!(
            response,
            ServerResponse::Error {
                message: "User not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_spectator_cannot_start_a_hand() {
        let (state, table_id) = state_with_table().await;
        state.registry.join_table(table_id, 2).await.unwrap();

        let response = handle_client_message(ClientMessage::Start, table_id, 77, &state).await;
        assert!(matches!(response, ServerResponse::Error { .. }));
        let snapshot = state.registry.snapshot(table_id).await.unwrap();
        assert_eq!(snapshot.round, Round::Waiting);

        let response = handle_client_message(ClientMessage::Start, table_id, 2, &state).await;
        assert_eq!(
            response,
            ServerResponse::Success {
                message: "Hand started".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_initial_notifications_include_own_cards() {
        let (state, table_id) = state_with_table().await;
        state.registry.join_table(table_id, 2).await.unwrap();

        let before = initial_notifications(&state, table_id, 2).await;
        assert_eq!(before.len(), 1);

        state.registry.start_hand(table_id, 2).await.unwrap();
        let during = initial_notifications(&state, table_id, 2).await;
        assert!(matches!(during[1], Notification::HoleCards { ref cards, .. } if cards.len() == 2));

        let spectator = initial_notifications(&state, table_id, 77).await;
        assert_eq!(spectator.len(), 1);
    }
}
