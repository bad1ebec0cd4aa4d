// ABOUTME: WebSocket route subscribing a client to one conversation's live updates
// ABOUTME: Subscription is per connection and torn down with it; unknown conversations are rejected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! WebSocket live updates
//!
//! A client opens `GET /api/chat/ws?chat_id=...` and receives every event
//! published for that conversation while the socket is open. The
//! subscription belongs to the connection: there is no shared client-side
//! handle to manage, and closing the socket is the whole teardown.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::broadcast::ChatEvent;
use crate::errors::AppError;
use crate::resources::ServerResources;

/// Query parameters for the subscription endpoint
#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    /// Conversation to watch
    pub chat_id: String,
}

/// WebSocket routes implementation
pub struct WebSocketRoutes;

impl WebSocketRoutes {
    /// Create the WebSocket route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat/ws", get(Self::handle_websocket))
            .with_state(resources)
    }

    /// Validate the conversation, then upgrade and stream its events.
    ///
    /// Subscribing to a conversation id that does not exist is rejected with
    /// a 404 before the upgrade completes.
    async fn handle_websocket(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<SubscribeQuery>,
        ws: WebSocketUpgrade,
    ) -> Result<Response, AppError> {
        let conversation = resources
            .database
            .chat()
            .get_conversation(&query.chat_id)
            .await?;
        if conversation.is_none() {
            return Err(AppError::not_found("Conversation"));
        }

        // Subscribe before the upgrade completes so no event published in
        // between is missed.
        let receiver = resources.broadcaster.subscribe(&query.chat_id).await;
        let chat_id = query.chat_id;

        Ok(ws.on_upgrade(move |socket| async move {
            debug!(conversation_id = %chat_id, "WebSocket subscriber connected");
            Self::stream_events(socket, &chat_id, receiver).await;
            debug!(conversation_id = %chat_id, "WebSocket subscriber disconnected");
        }))
    }

    /// Forward broadcast events to the socket until either side goes away
    async fn stream_events(
        socket: WebSocket,
        conversation_id: &str,
        mut receiver: tokio::sync::broadcast::Receiver<ChatEvent>,
    ) {
        let (mut ws_tx, mut ws_rx) = socket.split();

        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Best-effort delivery: a slow viewer misses events
                        // instead of stalling the publisher.
                        warn!(
                            conversation_id = %conversation_id,
                            skipped,
                            "WebSocket subscriber lagged behind"
                        );
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = ws_rx.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients only listen on this channel; anything else
                    // they send is ignored.
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}
