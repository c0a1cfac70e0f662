//! Session cursor: per-session record of content already served
//!
//! Every "load more" call excludes what the cursor holds and appends what it
//! served, so repeated calls over one collection never repeat content. Ids
//! are only ever appended, never removed, for the lifetime of the session.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::content::{ContentContext, ContentItem};
use crate::store::{ExcludeIds, FeedScope};

/// A thread and the section it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    pub section_id: String,
    pub id: String,
}

/// A comment and the thread it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRef {
    pub thread: ThreadRef,
    pub id: String,
}

/// A subcomment and the comment it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcommentRef {
    pub comment: CommentRef,
    pub id: String,
}

/// The slices of one author's history a viewer has already been served:
/// threads created, comments, subcomments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySeen {
    #[serde(default)]
    pub threads: Vec<ThreadRef>,
    #[serde(default)]
    pub comments: Vec<CommentRef>,
    #[serde(default)]
    pub subcomments: Vec<SubcommentRef>,
}

impl ActivitySeen {
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty() && self.comments.is_empty() && self.subcomments.is_empty()
    }

    /// Record one served item under the matching sub-list. Re-recording an
    /// item is a no-op.
    pub fn record(&mut self, item: &ContentItem) {
        match &item.context {
            ContentContext::Thread { section_id } => {
                push_unique(
                    &mut self.threads,
                    ThreadRef {
                        section_id: section_id.clone(),
                        id: item.id.clone(),
                    },
                );
            }
            ContentContext::Comment {
                section_id,
                thread_id,
            } => {
                push_unique(
                    &mut self.comments,
                    CommentRef {
                        thread: ThreadRef {
                            section_id: section_id.clone(),
                            id: thread_id.clone(),
                        },
                        id: item.id.clone(),
                    },
                );
            }
            ContentContext::Subcomment {
                section_id,
                thread_id,
                comment_id,
            } => {
                push_unique(
                    &mut self.subcomments,
                    SubcommentRef {
                        comment: CommentRef {
                            thread: ThreadRef {
                                section_id: section_id.clone(),
                                id: thread_id.clone(),
                            },
                            id: comment_id.clone(),
                        },
                        id: item.id.clone(),
                    },
                );
            }
        }
    }
}

/// Which view a user-activity page is served into. Dashboard and profile
/// pages track separate exclusion histories for the same user, so paging
/// through one never hides content from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityView {
    Dashboard,
    Profile,
}

impl ActivityView {
    /// Cursor key for this view of the given user's activity.
    pub fn cursor_key(self, user_id: &str) -> String {
        match self {
            ActivityView::Dashboard => format!("dashboard-{user_id}"),
            ActivityView::Profile => user_id.to_string(),
        }
    }
}

/// Exclusion sets accumulated while a user pages through feeds.
///
/// Lazily created empty on first access; opaque to everything except the
/// recycling engine and the session store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Served slices of single users' own history, keyed per view
    /// (see [`ActivityView::cursor_key`]).
    #[serde(default)]
    pub user_activity: HashMap<String, ActivitySeen>,
    /// Activity already served into the home feed, keyed by author id.
    #[serde(default)]
    pub feed_activity: HashMap<String, ActivitySeen>,
    /// Saved threads already served, keyed by section id.
    #[serde(default)]
    pub saved_threads: HashMap<String, Vec<String>>,
    /// Section-listing threads already served, keyed by section id.
    #[serde(default)]
    pub section_threads: HashMap<String, Vec<String>>,
    /// Comments already served, keyed by thread id.
    #[serde(default)]
    pub thread_comments: HashMap<String, Vec<String>>,
    /// Explore-listing threads already served, keyed by section id.
    #[serde(default)]
    pub general_threads: HashMap<String, Vec<String>>,
}

impl Cursor {
    /// Assemble the exclusion payload for a recycle call over `scope`.
    /// An empty payload means "first page, discard nothing".
    pub fn exclude_ids(&self, scope: &FeedScope) -> ExcludeIds {
        match scope {
            FeedScope::Section { section_id } => ExcludeIds::Ids(
                self.section_threads
                    .get(section_id)
                    .cloned()
                    .unwrap_or_default(),
            ),
            FeedScope::Thread { thread_id, .. } => ExcludeIds::Ids(
                self.thread_comments
                    .get(thread_id)
                    .cloned()
                    .unwrap_or_default(),
            ),
            FeedScope::General => ExcludeIds::IdsBySection(self.general_threads.clone()),
            FeedScope::Saved { .. } => ExcludeIds::IdsBySection(self.saved_threads.clone()),
            FeedScope::UserActivity { user_id, view } => {
                let seen = self
                    .user_activity
                    .get(&view.cursor_key(user_id))
                    .cloned()
                    .unwrap_or_default();
                ExcludeIds::Activity(HashMap::from([(user_id.clone(), seen)]))
            }
            FeedScope::FeedActivity { author_ids } => {
                let by_author = author_ids
                    .iter()
                    .map(|id| {
                        (
                            id.clone(),
                            self.feed_activity.get(id).cloned().unwrap_or_default(),
                        )
                    })
                    .collect();
                ExcludeIds::Activity(by_author)
            }
        }
    }

    /// Merge a served page into the exclusion set for `scope`. Append-only:
    /// ids already present are left in place.
    pub fn absorb(&mut self, scope: &FeedScope, items: &[ContentItem]) {
        match scope {
            FeedScope::Section { section_id } => {
                let seen = self.section_threads.entry(section_id.clone()).or_default();
                for item in items {
                    push_unique(seen, item.id.clone());
                }
            }
            FeedScope::Thread { thread_id, .. } => {
                let seen = self.thread_comments.entry(thread_id.clone()).or_default();
                for item in items {
                    // A comment page carries comments only; anything else in
                    // the stream is not part of this collection.
                    if matches!(item.context, ContentContext::Comment { .. }) {
                        push_unique(seen, item.id.clone());
                    }
                }
            }
            FeedScope::General => {
                for item in items {
                    let seen = self
                        .general_threads
                        .entry(item.context.section_id().to_string())
                        .or_default();
                    push_unique(seen, item.id.clone());
                }
            }
            FeedScope::Saved { .. } => {
                for item in items {
                    let seen = self
                        .saved_threads
                        .entry(item.context.section_id().to_string())
                        .or_default();
                    push_unique(seen, item.id.clone());
                }
            }
            FeedScope::UserActivity { user_id, view } => {
                let seen = self
                    .user_activity
                    .entry(view.cursor_key(user_id))
                    .or_default();
                for item in items {
                    seen.record(item);
                }
            }
            FeedScope::FeedActivity { .. } => {
                for item in items {
                    self.feed_activity
                        .entry(item.author_id.clone())
                        .or_default()
                        .record(item);
                }
            }
        }
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StatusTag;

    fn thread_item(id: &str, section: &str, author: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            author_id: author.to_string(),
            status: StatusTag::New,
            context: ContentContext::Thread {
                section_id: section.to_string(),
            },
        }
    }

    fn comment_item(id: &str, section: &str, thread: &str, author: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            author_id: author.to_string(),
            status: StatusTag::Rel,
            context: ContentContext::Comment {
                section_id: section.to_string(),
                thread_id: thread.to_string(),
            },
        }
    }

    #[test]
    fn test_absorb_section_threads_appends_without_duplicates() {
        let mut cursor = Cursor::default();
        let scope = FeedScope::Section {
            section_id: "mylife".to_string(),
        };
        let page = vec![
            thread_item("t1", "mylife", "u1"),
            thread_item("t2", "mylife", "u2"),
        ];

        cursor.absorb(&scope, &page);
        cursor.absorb(&scope, &page);
        cursor.absorb(&scope, &[thread_item("t3", "mylife", "u1")]);

        assert_eq!(cursor.section_threads["mylife"], vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_absorb_thread_comments_skips_non_comments() {
        let mut cursor = Cursor::default();
        let scope = FeedScope::Thread {
            section_id: "mylife".to_string(),
            thread_id: "t1".to_string(),
        };
        let page = vec![
            comment_item("c1", "mylife", "t1", "u1"),
            thread_item("t9", "mylife", "u1"),
            comment_item("c2", "mylife", "t1", "u2"),
        ];

        cursor.absorb(&scope, &page);

        assert_eq!(cursor.thread_comments["t1"], vec!["c1", "c2"]);
    }

    #[test]
    fn test_absorb_general_groups_by_section() {
        let mut cursor = Cursor::default();
        let page = vec![
            thread_item("t1", "mylife", "u1"),
            thread_item("t2", "tech", "u2"),
            thread_item("t3", "mylife", "u3"),
        ];

        cursor.absorb(&FeedScope::General, &page);

        assert_eq!(cursor.general_threads["mylife"], vec!["t1", "t3"]);
        assert_eq!(cursor.general_threads["tech"], vec!["t2"]);
    }

    #[test]
    fn test_absorb_saved_groups_by_section_separately_from_general() {
        let mut cursor = Cursor::default();
        let saved = FeedScope::Saved {
            user_id: "u1".to_string(),
        };
        let page = vec![
            thread_item("t1", "mylife", "u2"),
            thread_item("t2", "tech", "u3"),
        ];

        cursor.absorb(&saved, &page);

        assert_eq!(cursor.saved_threads["mylife"], vec!["t1"]);
        assert_eq!(cursor.saved_threads["tech"], vec!["t2"]);
        // Saved paging leaves the explore listing untouched.
        assert!(cursor.general_threads.is_empty());
        let ExcludeIds::IdsBySection(by_section) = cursor.exclude_ids(&saved) else {
            panic!("expected per-section payload");
        };
        assert_eq!(by_section.len(), 2);
    }

    #[test]
    fn test_dashboard_and_profile_views_track_separately() {
        let mut cursor = Cursor::default();
        let dashboard = FeedScope::UserActivity {
            user_id: "u1".to_string(),
            view: ActivityView::Dashboard,
        };
        let profile = FeedScope::UserActivity {
            user_id: "u1".to_string(),
            view: ActivityView::Profile,
        };

        cursor.absorb(&dashboard, &[thread_item("t1", "mylife", "u1")]);
        cursor.absorb(&profile, &[thread_item("t2", "mylife", "u1")]);

        assert_eq!(cursor.user_activity["dashboard-u1"].threads.len(), 1);
        assert_eq!(cursor.user_activity["u1"].threads.len(), 1);

        // Exclusions for one view never leak into the other.
        let ExcludeIds::Activity(by_author) = cursor.exclude_ids(&profile) else {
            panic!("expected activity payload");
        };
        assert_eq!(by_author["u1"].threads[0].id, "t2");
    }

    #[test]
    fn test_absorb_feed_activity_groups_by_author() {
        let mut cursor = Cursor::default();
        let scope = FeedScope::FeedActivity {
            author_ids: vec!["u1".to_string(), "u2".to_string()],
        };
        let page = vec![
            thread_item("t1", "mylife", "u1"),
            comment_item("c1", "tech", "t5", "u2"),
            comment_item("c2", "tech", "t5", "u1"),
        ];

        cursor.absorb(&scope, &page);

        assert_eq!(cursor.feed_activity["u1"].threads.len(), 1);
        assert_eq!(cursor.feed_activity["u1"].comments.len(), 1);
        assert_eq!(cursor.feed_activity["u2"].comments[0].id, "c1");
    }

    #[test]
    fn test_exclude_ids_empty_on_fresh_cursor() {
        let cursor = Cursor::default();
        let scope = FeedScope::Section {
            section_id: "mylife".to_string(),
        };
        assert!(cursor.exclude_ids(&scope).is_empty());

        let scope = FeedScope::FeedActivity {
            author_ids: vec!["u1".to_string()],
        };
        assert!(cursor.exclude_ids(&scope).is_empty());
    }

    #[test]
    fn test_exclude_ids_cover_every_listed_author() {
        let mut cursor = Cursor::default();
        let scope = FeedScope::FeedActivity {
            author_ids: vec!["u1".to_string(), "u2".to_string()],
        };
        cursor.absorb(&scope, &[thread_item("t1", "mylife", "u1")]);

        let ExcludeIds::Activity(by_author) = cursor.exclude_ids(&scope) else {
            panic!("expected activity payload");
        };
        // u2 has nothing served yet but is still present, empty.
        assert_eq!(by_author.len(), 2);
        assert!(by_author["u2"].is_empty());
        assert_eq!(by_author["u1"].threads[0].id, "t1");
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut seen = ActivitySeen::default();
        let item = comment_item("c1", "mylife", "t1", "u1");
        seen.record(&item);
        seen.record(&item);
        assert_eq!(seen.comments.len(), 1);
    }

    #[test]
    fn test_activity_view_keys() {
        assert_eq!(ActivityView::Dashboard.cursor_key("u1"), "dashboard-u1");
        assert_eq!(ActivityView::Profile.cursor_key("u1"), "u1");
    }
}
