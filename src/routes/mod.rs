// ABOUTME: HTTP route groups: chat turns, WebSocket live updates, and health
// ABOUTME: Route structs expose a routes(resources) constructor merged by the server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Chat view, message submission, and clear-history endpoints
pub mod chat;

/// Liveness endpoint
pub mod health;

/// WebSocket subscription endpoint for live conversation updates
pub mod websocket;
