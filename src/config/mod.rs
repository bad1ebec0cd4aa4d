// ABOUTME: Configuration module root re-exporting environment-driven server settings
// ABOUTME: All deployment knobs are read once at startup from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Environment-based server configuration
pub mod environment;

pub use environment::{DatabaseConfig, GatewayConfig, ServerConfig, SessionConfig};
