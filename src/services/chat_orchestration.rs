// ABOUTME: Conversation resolution and chat-turn orchestration for session-scoped threads
// ABOUTME: Decides which conversation a session maps to and drives the dispatch to the gateway
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Chat Orchestration
//!
//! The session-scoped conversation protocol:
//!
//! - A browser session is bound to at most one conversation. Resolution
//!   returns the bound conversation when it still matches the caller's
//!   identity and provider/model selection, and forks a fresh one otherwise.
//!   Switching provider or model never mutates a thread - it replaces it.
//! - A turn appends the user message first, then dispatches the entire
//!   ordered history to the gateway. A failed dispatch persists nothing; the
//!   orphaned user message rides along in the next turn's history, which is
//!   the intended "retry by re-asking" behavior.
//!
//! Nothing here touches HTTP types; routes own the wire format.

use tracing::{debug, info};

use crate::database::{ConversationRecord, Database, MessageRecord};
use crate::errors::{AppError, AppResult};
use crate::gateway::{GatewayClient, MessageRole, PromptMessage};
use crate::session::SessionManager;

/// Label recorded on an assistant message when the conversation's provider
/// is no longer present in the option list
const UNKNOWN_BACKEND_TYPE: &str = "unknown";

/// Result of resolving a session's conversation
pub struct ResolvedConversation {
    /// The active conversation for this session
    pub conversation: ConversationRecord,
    /// Whether resolution forked a fresh conversation
    pub created: bool,
}

/// Find the conversation bound to the session, enforcing ownership.
///
/// A binding that points at a missing conversation, or at one owned by a
/// different identity (guest vs. authenticated included), is treated as "not
/// found" - a stale or shared session artifact must never resume someone
/// else's thread.
///
/// # Errors
///
/// Returns storage errors only; this function never contacts the network.
pub async fn find_bound_conversation(
    database: &Database,
    sessions: &SessionManager,
    session_id: &str,
    subject: Option<&str>,
) -> AppResult<Option<ConversationRecord>> {
    let Some(conversation_id) = sessions.conversation_id(session_id) else {
        return Ok(None);
    };

    let Some(conversation) = database.chat().get_conversation(&conversation_id).await? else {
        return Ok(None);
    };

    if !conversation.owned_by(subject) {
        debug!(
            conversation_id = %conversation.id,
            "Session binding rejected: conversation owned by a different identity"
        );
        return Ok(None);
    }

    Ok(Some(conversation))
}

/// Resolve the active conversation for a session, creating and rebinding
/// when no valid binding exists or the provider/model selection changed.
///
/// Calling this twice with an unchanged selection returns the same
/// conversation; changing provider or model always yields a fresh one and
/// leaves the old thread's messages untouched.
///
/// # Errors
///
/// Returns storage errors only; this function never contacts the network.
pub async fn resolve_conversation(
    database: &Database,
    sessions: &SessionManager,
    session_id: &str,
    subject: Option<&str>,
    llm_uuid: &str,
    model: &str,
) -> AppResult<ResolvedConversation> {
    if let Some(conversation) =
        find_bound_conversation(database, sessions, session_id, subject).await?
    {
        if !conversation.needs_reset(llm_uuid, model) {
            return Ok(ResolvedConversation {
                conversation,
                created: false,
            });
        }
        info!(
            old = %conversation.id,
            provider = %llm_uuid,
            model = %model,
            "Provider/model switch: forking a fresh conversation"
        );
    }

    let conversation = database
        .chat()
        .create_conversation(subject, llm_uuid, model)
        .await?;
    sessions.bind_conversation(session_id, &conversation.id);

    Ok(ResolvedConversation {
        conversation,
        created: true,
    })
}

/// Append the user's message to the conversation. Pure persistence - no
/// network call.
///
/// # Errors
///
/// Returns a validation error for blank content, storage errors otherwise.
pub async fn append_user_message(
    database: &Database,
    conversation_id: &str,
    content: &str,
) -> AppResult<MessageRecord> {
    if content.trim().is_empty() {
        return Err(AppError::validation("Message must not be empty"));
    }

    database
        .chat()
        .add_message(conversation_id, MessageRole::User, content, None)
        .await
}

/// Dispatch the conversation to the gateway and persist the assistant reply.
///
/// The full ordered history - every message, oldest first, including any
/// orphaned user messages from failed turns - is the dispatch payload. On
/// success the reply is persisted with a provider-type label resolved from
/// the caller's option list (`"unknown"` when the stored provider id is no
/// longer offered). On failure nothing is persisted and the error kind
/// propagates for user-facing reporting.
///
/// # Errors
///
/// Returns `NoBackendAvailable` when the caller has no usable options,
/// gateway errors from the dispatch, and storage errors from persistence.
pub async fn produce_assistant_reply(
    database: &Database,
    gateway: &GatewayClient,
    conversation: &ConversationRecord,
    credential: Option<&str>,
) -> AppResult<MessageRecord> {
    let options = gateway.available_options(credential).await?;
    if options.is_empty() {
        return Err(AppError::no_backend("No LLM available"));
    }

    let llm_type = options
        .iter()
        .find(|option| option.uuid == conversation.llm_uuid)
        .map_or(UNKNOWN_BACKEND_TYPE, |option| option.llm_type.as_str());

    let history: Vec<PromptMessage> = database
        .chat()
        .ordered_messages(&conversation.id)
        .await?
        .into_iter()
        .map(|message| PromptMessage {
            role: message.role,
            content: message.content,
        })
        .collect();

    let reply = gateway
        .submit(
            credential,
            &conversation.llm_uuid,
            &conversation.model,
            &history,
        )
        .await?;

    database
        .chat()
        .add_message(
            &conversation.id,
            MessageRole::Assistant,
            &reply,
            Some(llm_type),
        )
        .await
}

/// Delete the session's bound conversation (cascading its messages) and
/// drop the binding. Ownership is enforced the same way as resolution, so a
/// stale session artifact cannot clear someone else's thread.
///
/// # Errors
///
/// Returns storage errors only.
pub async fn clear_conversation(
    database: &Database,
    sessions: &SessionManager,
    session_id: &str,
    subject: Option<&str>,
) -> AppResult<Option<String>> {
    let Some(conversation) =
        find_bound_conversation(database, sessions, session_id, subject).await?
    else {
        sessions.clear_conversation(session_id);
        return Ok(None);
    };

    database.chat().delete_conversation(&conversation.id).await?;
    sessions.clear_conversation(session_id);

    info!(conversation_id = %conversation.id, "Conversation history cleared");
    Ok(Some(conversation.id))
}
