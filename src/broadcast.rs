// ABOUTME: Fire-and-forget publisher pushing conversation updates to live WebSocket viewers
// ABOUTME: One tokio broadcast channel per conversation id; no acknowledgment, no replay
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Conversation Broadcasting
//!
//! Addressing is by conversation identity: every viewer of a conversation
//! subscribes to its channel and receives whatever is published while they
//! are connected. Delivery is best-effort - subscribers who connect late or
//! lag behind miss events, and a publish with no audience is simply dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use crate::database::MessageRecord;

/// Buffered events per conversation channel before slow subscribers lag
const CHANNEL_CAPACITY: usize = 64;

/// Event pushed to live viewers of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatEvent {
    /// The conversation gained a message; carries the full ordered list so
    /// clients replace their view wholesale instead of merging deltas
    NewMessage {
        /// Conversation the update belongs to
        conversation_id: String,
        /// Full ordered message list
        messages: Vec<MessageRecord>,
    },
    /// A turn failed after the user message was accepted
    Error {
        /// Conversation the failure belongs to
        conversation_id: String,
        /// User-visible description
        message: String,
    },
}

/// Publishes rendered updates to all live subscribers of a conversation
#[derive(Clone, Default)]
pub struct ConversationBroadcaster {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ChatEvent>>>>,
}

impl ConversationBroadcaster {
    /// Create an empty broadcaster
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a conversation's events, creating its channel on first use
    pub async fn subscribe(&self, conversation_id: &str) -> broadcast::Receiver<ChatEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(conversation_id) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(conversation_id.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Push an event to every live subscriber of the conversation.
    ///
    /// Never blocks and never fails the caller: with no channel or no
    /// remaining receivers the event is dropped.
    pub async fn publish(&self, conversation_id: &str, event: ChatEvent) {
        let dead = {
            let channels = self.channels.read().await;
            match channels.get(conversation_id) {
                Some(sender) => sender.send(event).is_err() && sender.receiver_count() == 0,
                None => {
                    trace!("No subscribers for conversation {}", conversation_id);
                    false
                }
            }
        };

        // Last subscriber is gone: drop the channel so cleared or abandoned
        // conversations don't accumulate senders.
        if dead {
            self.channels.write().await.remove(conversation_id);
        }
    }

    /// Drop a conversation's channel (used when its history is cleared)
    pub async fn remove(&self, conversation_id: &str) {
        self.channels.write().await.remove(conversation_id);
    }

    /// Number of conversations with an open channel
    pub async fn active_channels(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(content: &str) -> MessageRecord {
        MessageRecord {
            id: "m1".to_owned(),
            conversation_id: "c1".to_owned(),
            role: "user".to_owned(),
            content: content.to_owned(),
            llm_type: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let broadcaster = ConversationBroadcaster::new();
        let mut rx = broadcaster.subscribe("c1").await;

        broadcaster
            .publish(
                "c1",
                ChatEvent::NewMessage {
                    conversation_id: "c1".to_owned(),
                    messages: vec![message("hello")],
                },
            )
            .await;

        match rx.recv().await.unwrap() {
            ChatEvent::NewMessage { messages, .. } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].content, "hello");
            }
            ChatEvent::Error { .. } => panic!("unexpected error event"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let broadcaster = ConversationBroadcaster::new();
        broadcaster
            .publish(
                "nobody-home",
                ChatEvent::Error {
                    conversation_id: "nobody-home".to_owned(),
                    message: "boom".to_owned(),
                },
            )
            .await;
        assert_eq!(broadcaster.active_channels().await, 0);
    }

    #[tokio::test]
    async fn test_channel_cleaned_up_after_last_subscriber_leaves() {
        let broadcaster = ConversationBroadcaster::new();
        let rx = broadcaster.subscribe("c1").await;
        assert_eq!(broadcaster.active_channels().await, 1);

        drop(rx);
        broadcaster
            .publish(
                "c1",
                ChatEvent::Error {
                    conversation_id: "c1".to_owned(),
                    message: "late".to_owned(),
                },
            )
            .await;

        assert_eq!(broadcaster.active_channels().await, 0);
    }

    #[tokio::test]
    async fn test_events_are_scoped_to_their_conversation() {
        let broadcaster = ConversationBroadcaster::new();
        let mut rx_a = broadcaster.subscribe("a").await;
        let mut rx_b = broadcaster.subscribe("b").await;

        broadcaster
            .publish(
                "a",
                ChatEvent::Error {
                    conversation_id: "a".to_owned(),
                    message: "only-a".to_owned(),
                },
            )
            .await;

        assert!(rx_a.recv().await.is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
