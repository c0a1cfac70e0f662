//! Content backend seam
//!
//! The engine and hub talk to the remote content-storage service through the
//! [`ContentStore`] trait: a streaming "recycle" call that fills a pattern's
//! slots, and a unary "mark all notifications read" call. Stream items arrive
//! in backend order; a stream may end normally (page complete) or with one of
//! the terminal statuses in [`StoreError`].

use std::collections::HashMap;

use futures::stream::BoxStream;

use crate::content::{ContentItem, StatusTag};
use crate::cursor::{ActivitySeen, ActivityView};

/// Terminal status reported by the content backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The section, thread, comment or user the call names does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Every remaining candidate is already excluded; the collection is
    /// exhausted for this cursor.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The backing partition is temporarily down.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure talking to the backend.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The backend partition a recycle call draws from.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedScope {
    /// Threads listed under one section.
    Section { section_id: String },
    /// Comments under one thread.
    Thread {
        section_id: String,
        thread_id: String,
    },
    /// Threads across all sections (explore).
    General,
    /// One user's saved threads.
    Saved { user_id: String },
    /// One user's own activity, served into a dashboard or profile view.
    UserActivity { user_id: String, view: ActivityView },
    /// Recent activity of the given authors (home feed).
    FeedActivity { author_ids: Vec<String> },
}

/// Exclusion payload accompanying a recycle call, shaped per scope.
#[derive(Debug, Clone, PartialEq)]
pub enum ExcludeIds {
    /// Flat id list (section threads, thread comments).
    Ids(Vec<String>),
    /// Ids grouped by section (general and saved threads).
    IdsBySection(HashMap<String, Vec<String>>),
    /// Previously served activity grouped by author id.
    Activity(HashMap<String, ActivitySeen>),
}

impl ExcludeIds {
    /// True when nothing is excluded: the first page of a browsing session.
    pub fn is_empty(&self) -> bool {
        match self {
            ExcludeIds::Ids(ids) => ids.is_empty(),
            ExcludeIds::IdsBySection(map) => map.values().all(|ids| ids.is_empty()),
            ExcludeIds::Activity(map) => map.values().all(|seen| seen.is_empty()),
        }
    }
}

/// One recycle call: where to draw from, which slots to fill and what to
/// leave out.
#[derive(Debug, Clone)]
pub struct RecycleRequest {
    pub scope: FeedScope,
    pub pattern: Vec<StatusTag>,
    pub exclude: ExcludeIds,
}

/// Server-streamed recycle results.
pub type ContentStream = BoxStream<'static, Result<ContentItem, StoreError>>;

/// Content backend the engine and hub call into (allows mocking in tests).
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Open a recycle stream for the given request.
    async fn recycle(&self, request: RecycleRequest) -> Result<ContentStream, StoreError>;

    /// Mark every notification of the given user as read.
    async fn mark_all_read(&self, user_id: &str) -> Result<(), StoreError>;
}
