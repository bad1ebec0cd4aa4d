// ABOUTME: Health endpoint for liveness checks and database connectivity
// ABOUTME: Returns 200 with a small JSON body when the server can reach its store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::errors::AppError;
use crate::resources::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health route
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .with_state(resources)
    }

    /// Liveness plus a database ping
    async fn health(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        resources.database.ping().await?;
        Ok((
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
            .into_response())
    }
}
