// ABOUTME: Database connection management and schema bootstrap for the chat store
// ABOUTME: SQLite via sqlx with idempotent CREATE TABLE statements run at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Chat Store
//!
//! A conventional relational store accessed through simple create/query
//! operations: conversations own messages, messages cascade on delete, and
//! ordering is by creation time. Schema management is deliberately plain -
//! idempotent DDL applied at startup.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Chat persistence operations
pub mod chat;

pub use chat::{ChatManager, ConversationRecord, MessageRecord};

/// Database handle owning the connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to the database, creating the SQLite file when missing
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails
    pub async fn connect(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::database(format!("Invalid database URL {url}: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {url}: {e}")))?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests with in-memory databases)
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply the schema. Safe to run on every startup.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                llm_uuid TEXT NOT NULL,
                model TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversations table: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL
                    REFERENCES conversations(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                llm_type TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages table: {e}")))?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
                ON messages(conversation_id, created_at)
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create messages index: {e}")))?;

        info!("Database schema ready");
        Ok(())
    }

    /// Lightweight connectivity check for the health endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Database ping failed: {e}")))?;
        Ok(())
    }

    /// Chat operations bound to this pool
    #[must_use]
    pub fn chat(&self) -> ChatManager {
        ChatManager::new(self.pool.clone())
    }

    /// Access the underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
