// ABOUTME: Environment-variable driven configuration for ports, database, gateway, and sessions
// ABOUTME: Loaded once at startup; a summary is logged so deployments are self-describing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Server Configuration
//!
//! All runtime configuration comes from environment variables (with `.env`
//! support for development). Defaults are chosen so `parley-chat-server`
//! starts against a local gateway with zero configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Default HTTP port for the chat server
const DEFAULT_HTTP_PORT: u16 = 8081;

/// Default base URL of the external LLM gateway
const DEFAULT_GATEWAY_BASE_URL: &str = "http://localhost:3000";

/// Default timeout for a single gateway chat submission, in seconds.
/// Model generation latency is high and unpredictable, so this is generous.
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 300;

/// Default SQLite database location
const DEFAULT_DATABASE_URL: &str = "sqlite:parley.db";

/// Default number of browser sessions tracked in memory
const DEFAULT_SESSION_CAPACITY: usize = 10_000;

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// LLM gateway configuration
    pub gateway: GatewayConfig,
    /// Browser session configuration
    pub session: SessionConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite path)
    pub url: String,
}

/// External LLM gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the gateway service
    pub base_url: String,
    /// Connect/read timeout for chat submissions, in seconds
    pub request_timeout_secs: u64,
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of sessions kept in the bounded in-memory store
    pub capacity: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse (e.g. a non-numeric
    /// `HTTP_PORT`). Unset variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        Ok(Self {
            http_port: env_var_or("HTTP_PORT", &DEFAULT_HTTP_PORT.to_string())
                .parse()
                .context("Invalid HTTP_PORT value")?,
            database: DatabaseConfig {
                url: env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            },
            gateway: GatewayConfig {
                base_url: trim_trailing_slash(env_var_or(
                    "LLM_GATEWAY_BASE_URL",
                    DEFAULT_GATEWAY_BASE_URL,
                )),
                request_timeout_secs: env_var_or(
                    "LLM_GATEWAY_TIMEOUT_SECS",
                    &DEFAULT_GATEWAY_TIMEOUT_SECS.to_string(),
                )
                .parse()
                .context("Invalid LLM_GATEWAY_TIMEOUT_SECS value")?,
            },
            session: SessionConfig {
                capacity: env_var_or("SESSION_CAPACITY", &DEFAULT_SESSION_CAPACITY.to_string())
                    .parse()
                    .context("Invalid SESSION_CAPACITY value")?,
            },
        })
    }

    /// One-line configuration summary for the startup log
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http_port={} database={} gateway={} gateway_timeout={}s session_capacity={}",
            self.http_port,
            self.database.url,
            self.gateway.base_url,
            self.gateway.request_timeout_secs,
            self.session.capacity
        )
    }
}

/// Read an environment variable, falling back to the given default
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Normalize a base URL so route paths can always be appended with `/`
fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
