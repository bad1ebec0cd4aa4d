// ABOUTME: Unified error handling with stable error codes and HTTP response formatting
// ABOUTME: Defines the chat-turn error taxonomy shared by storage, gateway, and route layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Unified Error Handling System
//!
//! One `AppError` type flows through the whole server. Storage, gateway, and
//! orchestration code construct it with the convenience constructors below and
//! propagate it unchanged; the route layer is the single place that turns it
//! into a user-visible JSON response. Raw failures never reach the end user.

use axum::{response::IntoResponse, response::Response, Json};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,

    // Resource Management (4000-4999)
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,

    // External LLM Gateway (5000-5999)
    #[serde(rename = "NO_BACKEND_AVAILABLE")]
    NoBackendAvailable = 5000,
    #[serde(rename = "GATEWAY_UNAVAILABLE")]
    GatewayUnavailable = 5001,
    #[serde(rename = "GATEWAY_RESPONSE_INVALID")]
    GatewayResponseInvalid = 5002,

    // Internal Errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::NoBackendAvailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayUnavailable | Self::GatewayResponseInvalid => StatusCode::BAD_GATEWAY,
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::NoBackendAvailable => {
                "No LLM backend is available. Please contact the administrator"
            }
            Self::GatewayUnavailable => "The LLM service is currently unavailable",
            Self::GatewayResponseInvalid => "The LLM service returned an unreadable response",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database operation failed",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Invalid or missing input
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// No usable LLM backend exists for this caller
    pub fn no_backend(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoBackendAvailable, message)
    }

    /// Transport failure, timeout, or non-success status from the gateway
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GatewayUnavailable, message)
    }

    /// Malformed response body from the gateway
    pub fn gateway_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GatewayResponseInvalid, message)
    }

    /// Persistence layer failure
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload
    pub error: ErrorResponseDetails,
}

/// Body of an HTTP error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable machine-readable code
    pub code: ErrorCode,
    /// User-visible message
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        // Internal details stay in the log; the client sees the generic description.
        if status.is_server_error() {
            tracing::error!(code = ?self.code, message = %self.message, "request failed");
            let body = ErrorResponse {
                error: ErrorResponseDetails {
                    code: self.code,
                    message: self.code.description().to_owned(),
                },
            };
            return (status, Json(body)).into_response();
        }
        tracing::warn!(code = ?self.code, message = %self.message, "request rejected");
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::new(ErrorCode::DatabaseError, error.to_string()).with_source(error)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}
