// ABOUTME: HTTP client for the external LLM gateway: option discovery and chat submission
// ABOUTME: One attempt per call, generous timeouts, all failures mapped to the error taxonomy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Gateway Client
//!
//! Two operations against one externally configured base URL:
//!
//! - `available_options` discovers which providers/models the caller may use.
//!   Guests see only the local backend; authenticated callers see their
//!   provider keys plus the local backend when it is reachable.
//! - `submit` posts a full ordered conversation history and returns the
//!   reply text.
//!
//! The client holds no state beyond the reqwest handle. It never retries:
//! a failed call ends the turn and the caller reports it.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use super::{LlmOption, PromptMessage, LOCAL_BACKEND_TYPE};
use crate::config::GatewayConfig;
use crate::errors::{AppError, AppResult};

// ============================================================================
// Wire Types
// ============================================================================

/// Envelope of `GET /api/llms`
#[derive(Debug, Deserialize)]
struct LlmsResponse {
    #[serde(default)]
    llms: Vec<LlmOption>,
}

/// Envelope of `GET /api/llm_api_keys`
#[derive(Debug, Deserialize)]
struct LlmApiKeysResponse {
    #[serde(default)]
    llm_api_keys: Vec<LlmOption>,
}

/// Body of `POST .../chats`
#[derive(Debug, serde::Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a [PromptMessage],
}

/// Envelope of the chat submission response
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    response: Option<SubmitResponseBody>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponseBody {
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the external LLM gateway
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a client for the configured gateway.
    ///
    /// The timeout covers both connect and read for chat submissions, since
    /// model generation latency dominates the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    pub fn new(config: &GatewayConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Build the full URL for a gateway endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    // ========================================================================
    // Option Discovery
    // ========================================================================

    /// List the LLM options available to this caller.
    ///
    /// Guests (no credential) are served by the local backend only; if none
    /// exists the caller has no usable backend at all. Authenticated callers
    /// get their configured provider keys, plus the local backend when
    /// reachable - a local-backend failure is tolerated as long as at least
    /// one provider key was obtained.
    ///
    /// # Errors
    ///
    /// Returns `NoBackendAvailable` when no usable option exists, or a
    /// gateway error when discovery itself fails.
    #[instrument(skip(self, credential), fields(authenticated = credential.is_some()))]
    pub async fn available_options(
        &self,
        credential: Option<&str>,
    ) -> AppResult<Vec<LlmOption>> {
        let Some(credential) = credential else {
            return self.local_options().await;
        };

        let mut options = self.fetch_api_keys(credential).await?;

        // Try to add the local backend, but don't fail the caller if it is
        // down - provider keys alone are a usable outcome.
        match self.local_options().await {
            Ok(local) => options.extend(local),
            Err(e) => {
                warn!("Local backend unavailable: {}", e);
                if options.is_empty() {
                    return Err(e);
                }
            }
        }

        Ok(options)
    }

    /// Fetch the local-backend options, erroring when none exist
    async fn local_options(&self) -> AppResult<Vec<LlmOption>> {
        let all = self.fetch_llms().await?;
        let local: Vec<LlmOption> = all
            .into_iter()
            .filter(|option| option.llm_type == LOCAL_BACKEND_TYPE)
            .collect();

        if local.is_empty() {
            return Err(AppError::no_backend(
                "No local LLM backend is available in the gateway",
            ));
        }

        Ok(local)
    }

    /// `GET {base}/api/llms`
    async fn fetch_llms(&self) -> AppResult<Vec<LlmOption>> {
        let response = self
            .client
            .get(self.api_url("api/llms"))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach gateway for LLM list: {}", e);
                AppError::gateway(format!("Failed to fetch LLMs: {e}")).with_source(e)
            })?;

        if !response.status().is_success() {
            error!("Failed to fetch LLMs: HTTP {}", response.status());
            return Ok(Vec::new());
        }

        let body: LlmsResponse = response.json().await.map_err(|e| {
            error!("Failed to parse LLM list response: {}", e);
            AppError::gateway_parse(format!("Failed to parse LLM list: {e}")).with_source(e)
        })?;

        Ok(body.llms)
    }

    /// `GET {base}/api/llm_api_keys` with the caller's bearer credential
    async fn fetch_api_keys(&self, credential: &str) -> AppResult<Vec<LlmOption>> {
        let response = self
            .client
            .get(self.api_url("api/llm_api_keys"))
            .header("Content-Type", "application/json")
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to reach gateway for provider keys: {}", e);
                AppError::gateway(format!("Failed to fetch provider keys: {e}")).with_source(e)
            })?;

        if !response.status().is_success() {
            error!("Failed to fetch provider keys: HTTP {}", response.status());
            return Ok(Vec::new());
        }

        let body: LlmApiKeysResponse = response.json().await.map_err(|e| {
            error!("Failed to parse provider keys response: {}", e);
            AppError::gateway_parse(format!("Failed to parse provider keys: {e}")).with_source(e)
        })?;

        Ok(body.llm_api_keys)
    }

    // ========================================================================
    // Conversation Submission
    // ========================================================================

    /// Submit a full ordered conversation and return the reply text.
    ///
    /// Exactly one attempt: transport failures, timeouts, non-success
    /// statuses, and malformed bodies all surface as errors and end the turn.
    /// A response whose reply field is absent yields an empty string rather
    /// than an error.
    ///
    /// # Errors
    ///
    /// Returns `GatewayUnavailable` on transport failure or non-success
    /// status, `GatewayResponseInvalid` on a malformed response body.
    #[instrument(skip(self, credential, messages), fields(provider = %provider_id, model = %model_id, history_len = messages.len()))]
    pub async fn submit(
        &self,
        credential: Option<&str>,
        provider_id: &str,
        model_id: &str,
        messages: &[PromptMessage],
    ) -> AppResult<String> {
        debug!("Submitting conversation to gateway: {:?}", messages);

        let url = self.api_url(&format!(
            "api/llm_api_keys/{provider_id}/models/{model_id}/chats"
        ));

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&SubmitRequest { prompt: messages });
        if let Some(credential) = credential {
            request = request.bearer_auth(credential);
        }

        let response = request.send().await.map_err(|e| {
            error!("Failed to submit conversation to gateway: {}", e);
            let kind = if e.is_timeout() {
                "timed out"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            AppError::gateway(format!("Gateway submission {kind}: {e}")).with_source(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read gateway response: {}", e);
            AppError::gateway(format!("Failed to read gateway response: {e}")).with_source(e)
        })?;

        if !status.is_success() {
            return Err(Self::submit_error(status, &body));
        }

        let parsed: SubmitResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse gateway response: {}", e);
            AppError::gateway_parse(format!("Malformed gateway response: {e}")).with_source(e)
        })?;

        let content = parsed
            .response
            .and_then(|r| r.message)
            .unwrap_or_default();

        debug!("Reply from gateway: {} chars", content.len());

        Ok(content)
    }

    /// Map a non-success submission status to an error
    fn submit_error(status: StatusCode, body: &str) -> AppError {
        let snippet: String = body.chars().take(200).collect();
        AppError::gateway(format!("Gateway returned HTTP {status}: {snippet}"))
    }
}
