// ABOUTME: Domain service layer: business logic extracted from route handlers
// ABOUTME: Services are free functions over injected collaborators, never HTTP-aware
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Conversation resolution and chat-turn orchestration
pub mod chat_orchestration;
