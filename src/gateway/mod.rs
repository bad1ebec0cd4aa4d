// ABOUTME: LLM gateway abstraction: wire types shared by the HTTP client and orchestration
// ABOUTME: Options describe selectable backends; prompt messages carry conversation history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # LLM Gateway
//!
//! Everything the server knows about the remote LLM service lives here: the
//! two HTTP operations (option discovery and conversation submission), the
//! normalized option shape, and the provider/model selection policy applied
//! when a caller leaves the choice open.

use serde::{Deserialize, Serialize};

/// Gateway HTTP client
pub mod client;
/// Provider/model selection policy
pub mod selection;

pub use client::GatewayClient;
pub use selection::{select_backend, SelectedBackend};

/// The always-available backend type usable without a credential
pub const LOCAL_BACKEND_TYPE: &str = "local";

/// Model name used when a selected option advertises no models
pub const FALLBACK_MODEL: &str = "default";

/// Role of one turn in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// Message authored by the end user
    User,
    /// Reply produced by the LLM backend
    Assistant,
}

impl MessageRole {
    /// Stable string form stored in the database and sent on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One selectable LLM backend, normalized from the gateway's responses.
///
/// Upstream payloads carry extra fields per provider; deserialization keeps
/// exactly these four and drops the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmOption {
    /// Provider identifier
    pub uuid: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Kind of backend (`"local"` for the credential-free backend)
    pub llm_type: String,
    /// Models this provider can serve
    #[serde(default)]
    pub available_models: Vec<String>,
}

/// One history entry in a conversation submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    /// `"user"` or `"assistant"`
    pub role: String,
    /// Message text
    pub content: String,
}
