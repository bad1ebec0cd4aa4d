// ABOUTME: Chat route handlers wiring resolver, orchestration, and publisher together
// ABOUTME: The single place where every error kind becomes a user-visible, non-crashing message
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Chat routes
//!
//! Three endpoints drive the whole chat experience:
//!
//! - `GET /api/chat` returns the session's current conversation, its ordered
//!   messages, and the LLM options this caller may select. Gateway trouble
//!   degrades to an empty option list plus an alert - the page still loads.
//! - `POST /api/chat/messages` runs one chat turn end to end: select
//!   backend, resolve/fork the conversation, persist the user message,
//!   dispatch to the gateway, persist the reply, broadcasting after each
//!   append. A failed dispatch keeps the user message and reports the error;
//!   it never rolls the turn back.
//! - `DELETE /api/chat` clears the bound conversation and its messages.
//!
//! Guests are fully supported; identity only changes which conversations a
//! session may resume and which options the gateway offers.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::auth;
use crate::broadcast::ChatEvent;
use crate::database::MessageRecord;
use crate::errors::{AppError, AppResult};
use crate::gateway::{select_backend, LlmOption};
use crate::resources::ServerResources;
use crate::services::chat_orchestration;
use crate::session::{cookies, SESSION_COOKIE};

/// Alert shown when the option list cannot be fetched for the view
const SERVICE_UNAVAILABLE_ALERT: &str =
    "Chat service is currently unavailable. Please try again later.";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for one chat turn
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Message text
    pub message: String,
    /// Requested provider id; omitted means "first available"
    #[serde(default)]
    pub api_key_uuid: Option<String>,
    /// Requested model id; omitted means the provider's first model
    #[serde(default)]
    pub model: Option<String>,
}

/// Response for the current-conversation view
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatViewResponse {
    /// Bound conversation, if the session has one
    pub conversation_id: Option<String>,
    /// Ordered messages of the bound conversation
    pub messages: Vec<MessageRecord>,
    /// Options this caller may select
    pub llm_options: Vec<LlmOption>,
    /// User-visible degradation notice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

/// Response for one chat turn
#[derive(Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    /// Conversation the turn ran against
    pub conversation_id: String,
    /// The persisted user message
    pub user_message: MessageRecord,
    /// The persisted assistant reply; absent when the dispatch failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<MessageRecord>,
    /// User-visible failure notice when the dispatch failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/chat",
                get(Self::current_conversation).delete(Self::clear_conversation),
            )
            .route("/api/chat/messages", post(Self::send_message))
            .with_state(resources)
    }

    // ========================================================================
    // View Handler
    // ========================================================================

    /// Current conversation, its messages, and the caller's LLM options.
    ///
    /// Read-only: a conversation comes into existence on the first message,
    /// not on page load. Any failure here degrades to an empty view with an
    /// alert instead of an error status, so the page always renders.
    async fn current_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Response {
        let (session_id, newly_issued) = resources.sessions.ensure(&headers);
        let user = auth::current_user(&headers);
        let credential = user.as_ref().map(|u| u.token.as_str());
        let subject = user.as_ref().map(|u| u.subject.as_str());

        let view = match Self::build_view(&resources, &session_id, subject, credential).await {
            Ok(view) => view,
            Err(e) => {
                error!("Error building chat view: {}", e);
                ChatViewResponse {
                    conversation_id: None,
                    messages: Vec::new(),
                    llm_options: Vec::new(),
                    alert: Some(SERVICE_UNAVAILABLE_ALERT.to_owned()),
                }
            }
        };

        let response = (StatusCode::OK, Json(view)).into_response();
        apply_session_cookie(response, &session_id, newly_issued)
    }

    async fn build_view(
        resources: &Arc<ServerResources>,
        session_id: &str,
        subject: Option<&str>,
        credential: Option<&str>,
    ) -> AppResult<ChatViewResponse> {
        let conversation = chat_orchestration::find_bound_conversation(
            &resources.database,
            &resources.sessions,
            session_id,
            subject,
        )
        .await?;

        let messages = match &conversation {
            Some(conversation) => {
                resources
                    .database
                    .chat()
                    .ordered_messages(&conversation.id)
                    .await?
            }
            None => Vec::new(),
        };

        let llm_options = resources.gateway.available_options(credential).await?;

        Ok(ChatViewResponse {
            conversation_id: conversation.map(|c| c.id),
            messages,
            llm_options,
            alert: None,
        })
    }

    // ========================================================================
    // Turn Handler
    // ========================================================================

    /// Run one chat turn: resolve the conversation, persist the user
    /// message, dispatch the full history to the gateway, persist the reply.
    ///
    /// Viewers are notified after each append. A dispatch failure is
    /// reported in the response and broadcast to viewers; the persisted user
    /// message stays, and the next turn resends it as part of the history.
    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        if request.message.trim().is_empty() {
            return Err(AppError::validation("Message must not be empty"));
        }

        let (session_id, newly_issued) = resources.sessions.ensure(&headers);
        let user = auth::current_user(&headers);
        let credential = user.as_ref().map(|u| u.token.as_str());
        let subject = user.as_ref().map(|u| u.subject.as_str());

        // One resolution at a time per session: a double-submit reuses the
        // conversation the first request created instead of forking twice.
        let session_lock = resources.session_lock(&session_id);
        let _session_guard = session_lock.lock().await;

        let options = resources.gateway.available_options(credential).await?;
        let selected = select_backend(
            &options,
            request.api_key_uuid.as_deref(),
            request.model.as_deref(),
        )?;

        let resolved = chat_orchestration::resolve_conversation(
            &resources.database,
            &resources.sessions,
            &session_id,
            subject,
            &selected.llm_uuid,
            &selected.model,
        )
        .await?;
        let conversation = resolved.conversation;

        // Turns on one conversation are serialized so message creation and
        // broadcast order match causal order.
        let turn_lock = resources.turn_lock(&conversation.id);
        let _turn_guard = turn_lock.lock().await;

        let user_message = chat_orchestration::append_user_message(
            &resources.database,
            &conversation.id,
            &request.message,
        )
        .await?;
        Self::broadcast_messages(&resources, &conversation.id).await;

        let turn = match chat_orchestration::produce_assistant_reply(
            &resources.database,
            &resources.gateway,
            &conversation,
            credential,
        )
        .await
        {
            Ok(assistant_message) => {
                Self::broadcast_messages(&resources, &conversation.id).await;
                TurnResponse {
                    conversation_id: conversation.id.clone(),
                    user_message,
                    assistant_message: Some(assistant_message),
                    error: None,
                }
            }
            Err(e) => {
                error!("Error in chat response: {}", e);
                let notice = e.code.description().to_owned();
                resources
                    .broadcaster
                    .publish(
                        &conversation.id,
                        ChatEvent::Error {
                            conversation_id: conversation.id.clone(),
                            message: notice.clone(),
                        },
                    )
                    .await;
                TurnResponse {
                    conversation_id: conversation.id.clone(),
                    user_message,
                    assistant_message: None,
                    error: Some(notice),
                }
            }
        };

        drop(_turn_guard);
        drop(_session_guard);
        resources.prune_locks();

        let response = (StatusCode::OK, Json(turn)).into_response();
        Ok(apply_session_cookie(response, &session_id, newly_issued))
    }

    /// Push the conversation's full ordered message list to live viewers
    async fn broadcast_messages(resources: &Arc<ServerResources>, conversation_id: &str) {
        match resources
            .database
            .chat()
            .ordered_messages(conversation_id)
            .await
        {
            Ok(messages) => {
                resources
                    .broadcaster
                    .publish(
                        conversation_id,
                        ChatEvent::NewMessage {
                            conversation_id: conversation_id.to_owned(),
                            messages,
                        },
                    )
                    .await;
            }
            Err(e) => {
                // Delivery is best-effort; the originating request already
                // has its own result.
                error!("Failed to load messages for broadcast: {}", e);
            }
        }
    }

    // ========================================================================
    // Clear Handler
    // ========================================================================

    /// Delete the session's conversation and all its messages
    async fn clear_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let (session_id, newly_issued) = resources.sessions.ensure(&headers);
        let user = auth::current_user(&headers);
        let subject = user.as_ref().map(|u| u.subject.as_str());

        let session_lock = resources.session_lock(&session_id);
        let _session_guard = session_lock.lock().await;

        let deleted = chat_orchestration::clear_conversation(
            &resources.database,
            &resources.sessions,
            &session_id,
            subject,
        )
        .await?;

        if let Some(conversation_id) = deleted {
            resources.broadcaster.remove(&conversation_id).await;
        }

        drop(_session_guard);
        resources.prune_locks();

        let response = StatusCode::NO_CONTENT.into_response();
        Ok(apply_session_cookie(response, &session_id, newly_issued))
    }
}

/// Attach the session cookie to a response when a new session was issued
fn apply_session_cookie(mut response: Response, session_id: &str, newly_issued: bool) -> Response {
    if !newly_issued {
        return response;
    }
    if let Ok(value) =
        HeaderValue::from_str(&cookies::session_set_cookie(SESSION_COOKIE, session_id))
    {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}
