// ABOUTME: Provider/model selection policy applied when the caller leaves the choice open
// ABOUTME: Defaults to the first available option; an unknown explicit provider id is rejected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{LlmOption, FALLBACK_MODEL};
use crate::errors::{AppError, AppResult};

/// The provider/model pair a turn will dispatch to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedBackend {
    /// Provider identifier
    pub llm_uuid: String,
    /// Model identifier
    pub model: String,
}

/// Resolve the provider and model for a turn.
///
/// - No provider requested: the first available option wins.
/// - A requested provider id must match an available option; routing a
///   request to a provider the user did not choose is worse than rejecting
///   odd input, so an unknown id is a validation error.
/// - No model requested: the chosen option's first advertised model, or the
///   fixed placeholder when it advertises none. An explicitly requested
///   model is taken as-is - the gateway is authoritative for model validity.
///
/// # Errors
///
/// Returns `NoBackendAvailable` when `options` is empty, or a validation
/// error when the requested provider id matches no option.
pub fn select_backend(
    options: &[LlmOption],
    requested_provider: Option<&str>,
    requested_model: Option<&str>,
) -> AppResult<SelectedBackend> {
    let option = match requested_provider {
        Some(uuid) => options
            .iter()
            .find(|option| option.uuid == uuid)
            .ok_or_else(|| {
                AppError::validation(format!("Unknown LLM provider: {uuid}"))
            })?,
        None => options
            .first()
            .ok_or_else(|| AppError::no_backend("No LLM options available"))?,
    };

    let model = match requested_model {
        Some(model) => model.to_owned(),
        None => option
            .available_models
            .first()
            .cloned()
            .unwrap_or_else(|| FALLBACK_MODEL.to_owned()),
    };

    Ok(SelectedBackend {
        llm_uuid: option.uuid.clone(),
        model,
    })
}
