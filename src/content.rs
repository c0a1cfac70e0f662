//! Content and notification records shared across the crate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality tier assigned to a content item by the ranking backend.
///
/// The core never computes these; it only consumes them to satisfy a
/// pattern's slot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusTag {
    /// Recently created.
    New,
    /// Ranked relevant by recent interactions.
    Rel,
    /// Top item of its collection.
    Top,
}

/// Where a content item lives: the parent chain down from its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentContext {
    Thread {
        section_id: String,
    },
    Comment {
        section_id: String,
        thread_id: String,
    },
    Subcomment {
        section_id: String,
        thread_id: String,
        comment_id: String,
    },
}

impl ContentContext {
    /// The section this content ultimately belongs to.
    pub fn section_id(&self) -> &str {
        match self {
            ContentContext::Thread { section_id }
            | ContentContext::Comment { section_id, .. }
            | ContentContext::Subcomment { section_id, .. } => section_id,
        }
    }
}

/// One unit of content served into a feed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Backend id of the item itself.
    pub id: String,
    /// Id of the user who authored the item.
    pub author_id: String,
    /// Quality tier the backend served this item under.
    pub status: StatusTag,
    /// Parent chain locating the item.
    pub context: ContentContext,
}

/// A live notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable id. A later notification with the same id supersedes any
    /// earlier one still waiting in an outbound queue.
    pub id: String,
    pub subject: String,
    pub message: String,
    pub permalink: String,
    pub timestamp: DateTime<Utc>,
}

/// A notification paired with the user it is for, as produced by
/// broadcast-triggering backend calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNotification {
    pub user_id: String,
    pub notification: Notification,
}
