//! Rialto - realtime core for the Rialto forum platform
//!
//! Rialto carries the live-notification and feed-pagination machinery of the
//! site: a hub that fans out notifications to connected users and an engine
//! that serves "load more" pages without ever repeating content within a
//! browsing session.
//!
//! ## Components
//!
//! - **Pattern**: fixed quality patterns shaping every served page
//! - **Cursor**: per-session record of content already served
//! - **Session**: cursor persistence against the web session store
//! - **Feed**: streaming page assembly against the content backend
//! - **Live**: connection registry, delivery pumps and the upgrade endpoint

pub mod content;
pub mod cursor;
pub mod feed;
pub mod live;
pub mod pattern;
pub mod session;
pub mod store;
pub mod types;

pub use content::{ContentContext, ContentItem, Notification, StatusTag, UserNotification};
pub use cursor::{ActivityView, Cursor};
pub use feed::{FeedPage, FeedRecycler};
pub use live::{handle_live_upgrade, Hub, LiveConfig, LiveUser};
pub use pattern::PatternKind;
pub use session::{CursorStore, MemorySession, SessionState};
pub use store::{ContentStore, ContentStream, ExcludeIds, FeedScope, RecycleRequest, StoreError};
pub use types::{RialtoError, Result};
