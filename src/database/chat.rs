// ABOUTME: Database operations for chat conversations and their ordered messages
// ABOUTME: Conversations are append-only threads; messages are never updated after creation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::gateway::MessageRole;

// ============================================================================
// Database Record Types
// ============================================================================

/// Database representation of a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: String,
    /// Owning identity subject; `None` means guest-owned
    pub user_id: Option<String>,
    /// Provider identifier selected for this conversation
    pub llm_uuid: String,
    /// Model identifier selected for this conversation
    pub model: String,
    /// When the conversation was created (RFC 3339)
    pub created_at: String,
    /// When the conversation was last updated (RFC 3339)
    pub updated_at: String,
}

impl ConversationRecord {
    /// Whether a provider/model switch requires forking a fresh conversation
    #[must_use]
    pub fn needs_reset(&self, llm_uuid: &str, model: &str) -> bool {
        self.llm_uuid != llm_uuid || self.model != model
    }

    /// Ownership check: an authenticated caller must own the conversation,
    /// a guest caller may only see guest-owned conversations.
    #[must_use]
    pub fn owned_by(&self, subject: Option<&str>) -> bool {
        self.user_id.as_deref() == subject
    }
}

/// Database representation of a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Role of the message sender (user or assistant)
    pub role: String,
    /// Message content
    pub content: String,
    /// Kind of backend that produced the reply (assistant messages only)
    pub llm_type: Option<String>,
    /// When the message was created (RFC 3339)
    pub created_at: String,
}

// ============================================================================
// Chat Manager
// ============================================================================

/// Chat database operations manager
pub struct ChatManager {
    pool: SqlitePool,
}

impl ChatManager {
    /// Create a new chat manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a new conversation for the given owner and provider/model pair
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_conversation(
        &self,
        user_id: Option<&str>,
        llm_uuid: &str,
        model: &str,
    ) -> AppResult<ConversationRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO conversations (id, user_id, llm_uuid, model, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(llm_uuid)
        .bind(model)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(ConversationRecord {
            id,
            user_id: user_id.map(ToOwned::to_owned),
            llm_uuid: llm_uuid.to_owned(),
            model: model.to_owned(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a conversation by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, llm_uuid, model, created_at, updated_at
            FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.map(|r| ConversationRecord {
            id: r.get("id"),
            user_id: r.get("user_id"),
            llm_uuid: r.get("llm_uuid"),
            model: r.get("model"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Delete a conversation and all its messages (cascade)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete_conversation(&self, conversation_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Append a message to a conversation and touch its `updated_at`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
        llm_type: Option<&str>,
    ) -> AppResult<MessageRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let role_str = role.as_str();

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, role, content, llm_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role_str)
        .bind(content)
        .bind(llm_type)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add message: {e}")))?;

        sqlx::query(
            r"
            UPDATE conversations
            SET updated_at = $1
            WHERE id = $2
            ",
        )
        .bind(&now)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation timestamp: {e}")))?;

        Ok(MessageRecord {
            id,
            conversation_id: conversation_id.to_owned(),
            role: role_str.to_owned(),
            content: content.to_owned(),
            llm_type: llm_type.map(ToOwned::to_owned),
            created_at: now,
        })
    }

    /// Get all messages for a conversation in chronological order.
    /// Equal timestamps fall back to insertion order (rowid).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn ordered_messages(&self, conversation_id: &str) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, llm_type, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, rowid ASC
            ",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        let messages = rows
            .into_iter()
            .map(|r| MessageRecord {
                id: r.get("id"),
                conversation_id: r.get("conversation_id"),
                role: r.get("role"),
                content: r.get("content"),
                llm_type: r.get("llm_type"),
                created_at: r.get("created_at"),
            })
            .collect();

        Ok(messages)
    }

    /// Count messages in a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn message_count(&self, conversation_id: &str) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM messages
            WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count messages: {e}")))?;

        Ok(row.get("count"))
    }
}
