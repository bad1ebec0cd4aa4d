// ABOUTME: Bounded in-memory browser session store and bare-hands cookie helpers
// ABOUTME: Each session binds at most one conversation id; the LRU bound prevents unbounded growth
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Browser Sessions
//!
//! A session is identified by an opaque cookie and holds exactly one piece of
//! state: the conversation id the browser is currently bound to. The store is
//! a bounded LRU so anonymous traffic cannot grow server memory without
//! limit; an evicted session simply starts a fresh conversation on its next
//! message, which is the same experience as an expired cookie.

use http::HeaderMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Cookie carrying the session identifier
pub const SESSION_COOKIE: &str = "parley_session";

/// Cookie helpers over raw headers.
///
/// Deliberately minimal: we only ever need to read `name=value` pairs from
/// the `Cookie` header and emit one `Set-Cookie` line, so a cookie crate
/// would be dead weight.
pub mod cookies {
    use http::header::COOKIE;
    use http::HeaderMap;

    /// Read a cookie value from the request headers
    #[must_use]
    pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key == name).then(|| value.to_owned())
            })
            .next()
    }

    /// Render a session `Set-Cookie` header value
    #[must_use]
    pub fn session_set_cookie(name: &str, value: &str) -> String {
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax")
    }
}

/// Per-session state. The conversation binding is the only field: the
/// session store holds at most one conversation id per browser.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// Conversation currently bound to this browser session
    pub conversation_id: Option<String>,
}

/// Bounded store of browser sessions
pub struct SessionManager {
    inner: Mutex<LruCache<String, SessionData>>,
}

impl SessionManager {
    /// Create a session store bounded to `capacity` entries
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Resolve the caller's session id, issuing a new one when the request
    /// carries no cookie. Returns `(session_id, newly_issued)`; the route
    /// layer sets the cookie when `newly_issued` is true.
    #[must_use]
    pub fn ensure(&self, headers: &HeaderMap) -> (String, bool) {
        if let Some(session_id) = cookies::get(headers, SESSION_COOKIE) {
            let mut cache = self.lock();
            if cache.get(&session_id).is_none() {
                // Known cookie, evicted state: rehydrate an empty session
                // rather than force a new cookie on the client.
                cache.put(session_id.clone(), SessionData::default());
            }
            return (session_id, false);
        }

        let session_id = Uuid::new_v4().to_string();
        self.lock().put(session_id.clone(), SessionData::default());
        (session_id, true)
    }

    /// Conversation id currently bound to the session, if any
    #[must_use]
    pub fn conversation_id(&self, session_id: &str) -> Option<String> {
        self.lock()
            .get(session_id)
            .and_then(|data| data.conversation_id.clone())
    }

    /// Bind the session to a conversation, replacing any previous binding
    pub fn bind_conversation(&self, session_id: &str, conversation_id: &str) {
        let mut cache = self.lock();
        if let Some(data) = cache.get_mut(session_id) {
            data.conversation_id = Some(conversation_id.to_owned());
        } else {
            cache.put(
                session_id.to_owned(),
                SessionData {
                    conversation_id: Some(conversation_id.to_owned()),
                },
            );
        }
    }

    /// Remove the session's conversation binding, returning the old value
    pub fn clear_conversation(&self, session_id: &str) -> Option<String> {
        self.lock()
            .get_mut(session_id)
            .and_then(|data| data.conversation_id.take())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, SessionData>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
