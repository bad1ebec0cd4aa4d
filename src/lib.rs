// ABOUTME: Main library entry point for the Parley chat server
// ABOUTME: Web chat back end proxying conversations to an external LLM gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Parley Chat Server
//!
//! A web chat back end that proxies user conversations to an externally
//! hosted LLM gateway. Users - authenticated via an external identity
//! provider, or anonymous guests - submit messages over HTTP; the server
//! persists them, forwards the full conversation history to the gateway,
//! persists the completion, and pushes live updates to WebSocket viewers.
//!
//! ## Architecture
//!
//! - **Gateway**: HTTP client for option discovery and chat submission
//! - **Services**: session-scoped conversation resolution and turn
//!   orchestration
//! - **Broadcast**: per-conversation fan-out to live viewers
//! - **Routes**: thin HTTP handlers and the single error-routing point
//! - **Database**: conversations and their ordered, append-only messages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley_chat_server::config::ServerConfig;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Parley configured: {}", config.summary());
//!     Ok(())
//! }
//! ```

/// Caller identity extraction from bearer credentials
pub mod auth;

/// Fire-and-forget publisher for live conversation updates
pub mod broadcast;

/// Configuration management
pub mod config;

/// Chat store: conversations and messages
pub mod database;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// External LLM gateway client and selection policy
pub mod gateway;

/// Production logging and structured output
pub mod logging;

/// Shared server resources and serialization locks
pub mod resources;

/// `HTTP` route groups
pub mod routes;

/// Router assembly and serve loop
pub mod server;

/// Domain service layer for conversation resolution and chat turns
pub mod services;

/// Bounded browser session store and cookie helpers
pub mod session;
