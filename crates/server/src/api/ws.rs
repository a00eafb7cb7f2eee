//! # Conversation WebSocket
//!
//! One socket carries one conversation. The session opens on the first
//! `start_conversation` (or `user_message`) and is torn down, and archived,
//! when the socket closes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};

use conclave_core::panel::{InboundEvent, PanelEvent};
use conclave_core::state::ConversationType;

use crate::SharedState;

const OUTBOUND_BUFFER: usize = 256;

#[utoipa::path(
    get,
    path = "/api/v1/ws",
    tag = "ws",
    responses((status = 101, description = "Switching protocols; JSON events tagged by `type` flow both ways"))
)]
pub async fn conversation_socket(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn client_error(code: &str, error: impl Into<String>, fatal: bool) -> PanelEvent {
    PanelEvent::Error {
        error: error.into(),
        code: code.to_string(),
        fatal,
    }
}

/// Events that may open a session; anything else waits for one
fn opens_session(event: &InboundEvent) -> Option<ConversationType> {
    match event {
        InboundEvent::StartConversation {
            conversation_type, ..
        } => Some(*conversation_type),
        InboundEvent::UserMessage { .. } => Some(ConversationType::default()),
        _ => None,
    }
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel::<PanelEvent>(OUTBOUND_BUFFER);
    let conversation_id: Arc<OnceCell<String>> = Arc::new(OnceCell::new());

    tracing::info!("Conversation socket connected");

    // Forward panel events to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(kind = event.kind(), error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Forward socket input to the session
    let recv_state = Arc::clone(&state);
    let recv_id = Arc::clone(&conversation_id);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let event: InboundEvent = match serde_json::from_str(&text) {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!(error = %e, "Rejected inbound message");
                    let _ = events_tx
                        .send(client_error("invalid_message", format!("Invalid message: {}", e), false))
                        .await;
                    continue;
                }
            };

            let id = match recv_id.get() {
                Some(id) => id.clone(),
                None => match opens_session(&event) {
                    Some(conversation_type) => {
                        let id = recv_state.registry.open(conversation_type, events_tx.clone()).await;
                        let _ = recv_id.set(id.clone());
                        id
                    }
                    None => {
                        if event == InboundEvent::Heartbeat {
                            let _ = events_tx
                                .send(PanelEvent::Ack {
                                    received: event.kind().to_string(),
                                    queued: false,
                                })
                                .await;
                        }
                        continue;
                    }
                },
            };

            if let Err(e) = recv_state.registry.dispatch(&id, event).await {
                tracing::warn!(conversation_id = %id, error = %e, "Session no longer accepts events");
                let _ = events_tx.send(client_error("session_closed", e.to_string(), true)).await;
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Some(id) = conversation_id.get() {
        match state.registry.teardown(id).await {
            Ok(Some(snapshot)) => tracing::info!(
                conversation_id = %id,
                phase = %snapshot.conversation.phase(),
                "Conversation socket closed"
            ),
            Ok(None) => {}
            Err(e) => tracing::warn!(conversation_id = %id, error = %e, "Teardown failed"),
        }
    } else {
        tracing::info!("Conversation socket closed before a conversation started");
    }
}
