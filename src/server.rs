// ABOUTME: Router assembly and the serve loop binding all route groups together
// ABOUTME: Applies request tracing and CORS middleware on the merged router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::resources::ServerResources;
use crate::routes::{chat::ChatRoutes, health::HealthRoutes, websocket::WebSocketRoutes};

/// The chat server: merged routes over one shared resource bundle
pub struct ChatServer {
    resources: Arc<ServerResources>,
}

impl ChatServer {
    /// Create a server from assembled resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Build the full application router
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .merge(ChatRoutes::routes(self.resources.clone()))
            .merge(WebSocketRoutes::routes(self.resources.clone()))
            .merge(HealthRoutes::routes(self.resources.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the port and serve until the process is stopped
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound or the server fails
    pub async fn run(&self, port: u16) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
