//! WebSocket handler streaming change notifications to scoreboards

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::AppState;
use crate::notify::ChangeNotification;

/// A connected client
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub client_id: String,
    pub connected_at: DateTime<Utc>,
}

/// Registry of open WebSocket connections
#[derive(Default)]
pub struct ConnectionManager {
    sessions: RwLock<HashMap<String, ClientSession>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: ClientSession) {
        let client_id = session.client_id.clone();
        self.sessions.write().await.insert(client_id, session);
    }

    pub async fn unregister(&self, client_id: &str) {
        self.sessions.write().await.remove(client_id);
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent once on connect
    #[serde(rename = "welcome")]
    Welcome { client_id: String },
    /// An entity changed
    #[serde(rename = "change")]
    Change(ChangeNotification),
    /// The client fell behind and missed notifications
    #[serde(rename = "lagged")]
    Lagged { missed: u64 },
    #[serde(rename = "pong")]
    Pong,
}

/// Messages sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Ping to keep connection alive
    #[serde(rename = "ping")]
    Ping,
}

/// Handle WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send(socket: &mut WebSocket, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to encode {:?}: {}", msg, e);
            true
        }
    }
}

/// Handle an individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // subscribe before greeting so nothing after the welcome is missed
    let mut changes = state.notifier.subscribe();

    let client_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket connected: {}", client_id);

    state
        .connections
        .register(ClientSession {
            client_id: client_id.clone(),
            connected_at: Utc::now(),
        })
        .await;

    let welcome = ServerMessage::Welcome {
        client_id: client_id.clone(),
    };
    if send(&mut socket, &welcome).await {
        loop {
            tokio::select! {
                change = changes.recv() => {
                    let msg = match change {
                        Ok(notification) => ServerMessage::Change(notification),
                        Err(RecvError::Lagged(missed)) => {
                            warn!("WebSocket {} lagged, {} notifications dropped", client_id, missed);
                            ServerMessage::Lagged { missed }
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if !send(&mut socket, &msg).await {
                        break;
                    }
                }
                result = socket.recv() => {
                    match result {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(ClientMessage::Ping) => {
                                    if !send(&mut socket, &ServerMessage::Pong).await {
                                        break;
                                    }
                                }
                                Err(e) => debug!("Ignoring client message from {}: {}", client_id, e),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        _ => {}
                    }
                }
            }
        }
    }

    state.connections.unregister(&client_id).await;
    info!("WebSocket disconnected: {}", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_message_shape() {
        let msg = ServerMessage::Change(ChangeNotification {
            entity_type: "combat".into(),
            entity_id: "c1".into(),
            entity: serde_json::json!({ "id": "c1" }),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "change");
        assert_eq!(value["entity_type"], "combat");
        assert_eq!(value["entity"]["id"], "c1");
    }

    #[tokio::test]
    async fn test_connection_manager() {
        let manager = ConnectionManager::new();
        manager
            .register(ClientSession {
                client_id: "a".into(),
                connected_at: Utc::now(),
            })
            .await;
        assert_eq!(manager.count().await, 1);
        manager.unregister("a").await;
        assert_eq!(manager.count().await, 0);
    }
}
