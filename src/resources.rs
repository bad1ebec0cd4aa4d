// ABOUTME: Shared server resources injected into route handlers as one Arc bundle
// ABOUTME: Also owns the per-session and per-conversation locks that serialize chat turns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Resources
//!
//! One bundle of collaborators constructed at startup and shared by every
//! route group. The two lock maps implement the serialization guarantees:
//! a session cannot fork duplicate conversations under double-submit, and
//! turns on one conversation broadcast in causal order.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::broadcast::ConversationBroadcaster;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::gateway::GatewayClient;
use crate::session::SessionManager;

/// Shared state for all route handlers
pub struct ServerResources {
    /// Chat store
    pub database: Database,
    /// External LLM gateway client
    pub gateway: GatewayClient,
    /// Browser session store
    pub sessions: SessionManager,
    /// Live-update publisher
    pub broadcaster: ConversationBroadcaster,
    /// Deployment configuration
    pub config: ServerConfig,
    /// Serializes conversation resolution per browser session
    session_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Serializes append/dispatch/broadcast per conversation
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ServerResources {
    /// Assemble the resource bundle
    #[must_use]
    pub fn new(
        database: Database,
        gateway: GatewayClient,
        sessions: SessionManager,
        broadcaster: ConversationBroadcaster,
        config: ServerConfig,
    ) -> Self {
        Self {
            database,
            gateway,
            sessions,
            broadcaster,
            config,
            session_locks: DashMap::new(),
            turn_locks: DashMap::new(),
        }
    }

    /// Lock guarding conversation resolution for one session. Holding it
    /// across resolve+turn makes resolution idempotent under double-submit.
    #[must_use]
    pub fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_owned())
            .or_default()
            .clone()
    }

    /// Lock serializing turns on one conversation, so overlapping requests
    /// cannot interleave message creation or reorder broadcasts.
    #[must_use]
    pub fn turn_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(conversation_id.to_owned())
            .or_default()
            .clone()
    }

    /// Drop lock entries nobody holds anymore. Called after a turn completes
    /// so the maps track in-flight work rather than all sessions ever seen.
    pub fn prune_locks(&self) {
        self.session_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        self.turn_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
