//! Cursor persistence against the web session store
//!
//! The cursor travels as one opaque JSON blob under the session key
//! `"discard_ids"`. Loading never fails: a missing or unreadable value just
//! means the session has no cursor yet and paging starts over. Saving only
//! surfaces persistence failures; callers log and carry on, since the worst
//! outcome is repeated content on the next page.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::cursor::Cursor;
use crate::types::Result;

/// Session key under which the cursor blob is stored.
pub const CURSOR_KEY: &str = "discard_ids";

/// Backing store for per-session values (allows mocking in tests).
#[async_trait::async_trait]
pub trait SessionState: Send + Sync {
    /// Fetch the raw value stored under `key`, if any.
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store the raw value under `key`.
    async fn put(&self, session_id: &str, key: &str, value: Vec<u8>) -> Result<()>;
}

/// Loads and saves session cursors against a [`SessionState`] backend.
pub struct CursorStore<S> {
    state: S,
}

impl<S: SessionState> CursorStore<S> {
    pub fn new(state: S) -> Self {
        Self { state }
    }

    /// Load the cursor for a session. Missing or unreadable values yield the
    /// empty cursor; this call never fails.
    pub async fn load(&self, session_id: &str) -> Cursor {
        let raw = match self.state.get(session_id, CURSOR_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Cursor::default(),
            Err(err) => {
                warn!(session_id, error = %err, "session read failed, starting with empty cursor");
                return Cursor::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(cursor) => cursor,
            Err(err) => {
                warn!(session_id, error = %err, "unreadable cursor value, starting with empty cursor");
                Cursor::default()
            }
        }
    }

    /// Load the cursor, apply `mutate` and persist the result. The mutation
    /// itself cannot fail; only a persistence failure propagates.
    pub async fn save<F>(&self, session_id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Cursor),
    {
        let mut cursor = self.load(session_id).await;
        mutate(&mut cursor);
        let raw = serde_json::to_vec(&cursor)?;
        if let Err(err) = self.state.put(session_id, CURSOR_KEY, raw).await {
            warn!(session_id, error = %err, "could not save cursor");
            return Err(err);
        }
        Ok(())
    }
}

/// In-memory session state for tests and single-process development.
#[derive(Clone, Default)]
pub struct MemorySession {
    values: Arc<RwLock<HashMap<String, HashMap<String, Vec<u8>>>>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionState for MemorySession {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self.values.read().await;
        Ok(values
            .get(session_id)
            .and_then(|session| session.get(key))
            .cloned())
    }

    async fn put(&self, session_id: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let mut values = self.values.write().await;
        values
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}
