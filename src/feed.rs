//! Feed recycling engine
//!
//! Serves "load more" pages: assembles a recycle request from the session
//! cursor and a quality pattern, drains the backend stream in arrival order,
//! and keeps whatever already arrived when the stream breaks mid-page. The
//! caller merges the served page back into the cursor afterwards, so the
//! next call excludes it.

use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::content::ContentItem;
use crate::cursor::Cursor;
use crate::pattern::PatternKind;
use crate::store::{ContentStore, FeedScope, RecycleRequest};
use crate::types::Result;

/// One recycled page.
#[derive(Debug, Clone)]
pub struct FeedPage {
    /// Items in arrival order, at most one per pattern slot. Slots the
    /// backend could not fill are simply absent; short pages are valid.
    pub items: Vec<ContentItem>,
    /// True when the stream broke before the page completed. The items
    /// received up to that point are still valid.
    pub partial: bool,
}

impl FeedPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Composes recycle requests and drains their result streams.
pub struct FeedRecycler<S> {
    store: S,
}

impl<S: ContentStore> FeedRecycler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Serve one page from `scope`: up to one item per slot of `kind`,
    /// excluding everything the cursor has already recorded for this
    /// collection.
    pub async fn recycle(
        &self,
        scope: &FeedScope,
        kind: PatternKind,
        cursor: &Cursor,
    ) -> Result<FeedPage> {
        let request = RecycleRequest {
            scope: scope.clone(),
            pattern: kind.slots().to_vec(),
            exclude: cursor.exclude_ids(scope),
        };
        let limit = kind.page_size();

        let mut stream = match self.store.recycle(request).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(scope = ?scope, error = %err, "recycle call failed");
                return Err(err.into());
            }
        };

        let mut items: Vec<ContentItem> = Vec::new();
        let mut partial = false;
        while items.len() < limit {
            match stream.next().await {
                Some(Ok(item)) => items.push(item),
                Some(Err(err)) => {
                    if items.is_empty() {
                        warn!(scope = ?scope, error = %err, "recycle stream failed before first item");
                        return Err(err.into());
                    }
                    warn!(
                        scope = ?scope,
                        error = %err,
                        received = items.len(),
                        "recycle stream broke mid-page, keeping partial result"
                    );
                    partial = true;
                    break;
                }
                None => break,
            }
        }

        debug!(scope = ?scope, served = items.len(), partial, "page served");
        Ok(FeedPage { items, partial })
    }
}
