use futures_util::{SinkExt, StreamExt};
use serde_json;
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::quiz::QuizService;
use crate::room_manager::RoomManager;
use party_types::{ClientMessage, ServerMessage};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;


use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    room_manager: Arc<RoomManager>,
    quiz_service: Arc<QuizService>,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let mut rate_limiter = RateLimiter::new();

    // Create connection and get receiver for outgoing messages
    let message_receiver = connection_manager.create_connection(connection_id).await;

    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        room_manager.clone(),
        quiz_service.clone(),
    );

    // Handle incoming messages
    let incoming_handler = {
        let connection_manager = connection_manager.clone();
        let message_handler = message_handler.clone();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        handle_message(
                            msg,
                            &mut rate_limiter,
                            &message_handler,
                            &connection_manager,
                            connection_id,
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Handle outgoing messages
    let outgoing_handler = {
        async move {
            let mut receiver = message_receiver;

            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {:?}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::text(json)).await {
                    warn!("Failed to send message to {}: {:?}", connection_id, e);
                    break;
                }
            }
        }
    };

    // Run both handlers concurrently
    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    // The disconnect flow drops the connection and frees the player's seat
    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
}

/// One inbound frame. A malformed or over-limit message costs the sender
/// an error answer, never the socket and never the room.
async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_manager: &ConnectionManager,
    connection_id: ConnectionId,
) {
    if !rate_limiter.check() {
        warn!("Rate limit exceeded for connection {}", connection_id);
        let _ = connection_manager
            .send_to_connection(
                connection_id,
                ServerMessage::Error {
                    message: "Too many messages, slow down".to_string(),
                },
            )
            .await;
        return;
    }

    // Only handle text messages
    if !msg.is_text() {
        return;
    }
    let text = match msg.to_str() {
        Ok(text) => text,
        Err(_) => return,
    };

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => message_handler.handle_message(client_message).await,
        Err(e) => {
            warn!("Unparseable message from {}: {}", connection_id, e);
            let _ = connection_manager
                .send_to_connection(
                    connection_id,
                    ServerMessage::Error {
                        message: format!("unrecognized message: {e}"),
                    },
                )
                .await;
        }
    }
}
