//! WebSocket handler for real-time updates

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use watermeter_core::{BridgeEvent, StateUpdate};

use crate::AppState;

/// WebSocket events sent to clients
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    Connected,
    DeviceBound {
        ieee_address: String,
        model_id: String,
    },
    DeviceUnbound {
        ieee_address: String,
    },
    State {
        ieee_address: String,
        state: StateUpdate,
    },
}

impl From<BridgeEvent> for WsEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::DeviceBound {
                ieee_address,
                model_id,
            } => WsEvent::DeviceBound {
                ieee_address,
                model_id,
            },
            BridgeEvent::DeviceUnbound { ieee_address } => WsEvent::DeviceUnbound { ieee_address },
            BridgeEvent::StateChanged {
                ieee_address,
                state,
            } => WsEvent::State {
                ieee_address,
                state,
            },
        }
    }
}

fn to_message(event: &WsEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            tracing::warn!("Failed to serialize WebSocket event: {}", e);
            None
        }
    }
}

/// Handle a WebSocket connection
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Send connected message
    if let Some(msg) = to_message(&WsEvent::Connected) {
        if sender.send(msg).await.is_err() {
            return;
        }
    }

    // Forward bridge events to the client
    let mut event_rx = state.bridge.subscribe();
    let send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let Some(msg) = to_message(&WsEvent::from(event)) else {
                        continue;
                    };
                    if sender.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("WebSocket client lagged, skipped {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    });

    // Clients only listen; drain until they close
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    send_task.abort();
}
