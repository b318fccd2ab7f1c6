//! In-memory document store.
//!
//! Reference backend for tests and the CLI demo. It keeps the semantics a real
//! versioned store would enforce:
//! - versions come from one store-wide counter, so a deleted and re-created
//!   document never reuses an old version
//! - a single search page is capped at `max_result_window`; larger result sets
//!   must be scrolled
//! - scroll cursors snapshot the matching ids when opened and are dropped
//!   once unused for longer than their keep-alive
//! - the store can be switched offline to fail every call

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::matcher;
use crate::ports::{
    BulkItemResult, BulkOperation, BulkStatus, Collection, DocumentStore, Hit, Precondition,
    RawDocument, SearchPage, SearchRequest, StoreError, Version,
};

pub const DEFAULT_MAX_RESULT_WINDOW: usize = 5000;

#[derive(Debug, Clone)]
struct StoredDocument {
    version: Version,
    body: Value,
}

struct ScrollContext {
    collection: Collection,
    remaining: VecDeque<String>,
    page_size: usize,
    with_source: bool,
    expires_at: Instant,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<Collection, BTreeMap<String, StoredDocument>>,
    scrolls: HashMap<String, ScrollContext>,
    last_version: u64,
    last_scroll: u64,
}

impl MemoryState {
    fn next_version(&mut self) -> Version {
        self.last_version += 1;
        Version::new(self.last_version)
    }

    fn documents(&self, collection: Collection) -> Option<&BTreeMap<String, StoredDocument>> {
        self.collections.get(&collection)
    }

    fn documents_mut(&mut self, collection: Collection) -> &mut BTreeMap<String, StoredDocument> {
        self.collections.entry(collection).or_default()
    }

    fn index(
        &mut self,
        collection: Collection,
        id: &str,
        body: Value,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        let current = self.documents(collection).and_then(|docs| docs.get(id)).map(|d| d.version);
        let accepted = match precondition {
            Precondition::None => true,
            Precondition::Absent => current.is_none(),
            Precondition::Version(expected) => current == Some(expected),
        };
        if !accepted {
            return Err(StoreError::Conflict {
                collection,
                id: id.to_string(),
            });
        }

        let version = self.next_version();
        self.documents_mut(collection)
            .insert(id.to_string(), StoredDocument { version, body });
        Ok(version)
    }

    fn purge_expired_scrolls(&mut self, now: Instant) {
        self.scrolls.retain(|_, context| context.expires_at > now);
    }

    fn delete(&mut self, collection: Collection, id: &str) -> bool {
        self.documents_mut(collection).remove(id).is_some()
    }

    /// Ids of matching documents in sort order.
    fn matching_ids(&self, collection: Collection, request: &SearchRequest) -> Vec<String> {
        let Some(docs) = self.documents(collection) else {
            return Vec::new();
        };
        let mut matched: Vec<(&String, &StoredDocument)> = docs
            .iter()
            .filter(|(_, doc)| matcher::matches(&request.filter, &doc.body))
            .collect();
        // Stable sort keeps id order among equal keys.
        matched.sort_by(|(_, a), (_, b)| matcher::order(&request.sort, &a.body, &b.body));
        matched.into_iter().map(|(id, _)| id.clone()).collect()
    }

    fn hits<'a>(
        &self,
        collection: Collection,
        ids: impl IntoIterator<Item = &'a String>,
        with_source: bool,
    ) -> Vec<Hit> {
        let Some(docs) = self.documents(collection) else {
            return Vec::new();
        };
        ids.into_iter()
            .filter_map(|id| {
                docs.get(id).map(|doc| Hit {
                    id: id.clone(),
                    version: doc.version,
                    source: with_source.then(|| doc.body.clone()),
                })
            })
            .collect()
    }
}

/// `DocumentStore` kept in process memory.
pub struct InMemoryDocumentStore {
    state: Mutex<MemoryState>,
    online: AtomicBool,
    max_result_window: usize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_max_result_window(DEFAULT_MAX_RESULT_WINDOW)
    }

    pub fn with_max_result_window(max_result_window: usize) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            online: AtomicBool::new(true),
            max_result_window,
        }
    }

    /// Make every subsequent call fail with `StoreError::Unavailable` (or recover).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: Collection) -> usize {
        let state = self.state.lock().await;
        state.documents(collection).map_or(0, BTreeMap::len)
    }

    /// Number of scroll cursors still open.
    pub async fn open_scrolls(&self) -> usize {
        let mut state = self.state.lock().await;
        state.purge_expired_scrolls(Instant::now());
        state.scrolls.len()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<RawDocument>, StoreError> {
        self.ensure_online()?;
        let state = self.state.lock().await;
        Ok(state
            .documents(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| RawDocument {
                version: doc.version,
                body: doc.body.clone(),
            }))
    }

    async fn index(
        &self,
        collection: Collection,
        id: &str,
        body: Value,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        state.index(collection, id, body, precondition)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        Ok(state.delete(collection, id))
    }

    async fn search(
        &self,
        collection: Collection,
        request: &SearchRequest,
    ) -> Result<SearchPage, StoreError> {
        self.ensure_online()?;
        if request.size > self.max_result_window {
            return Err(StoreError::Unavailable(format!(
                "result window is too large: size {} exceeds {}",
                request.size, self.max_result_window
            )));
        }

        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.purge_expired_scrolls(now);
        let mut ids: VecDeque<String> = state.matching_ids(collection, request).into();
        let page_size = request.size.min(ids.len());
        let first: Vec<String> = ids.drain(..page_size).collect();
        let hits = state.hits(collection, &first, request.with_source);

        let scroll_id = request.scroll.map(|keep_alive| {
            state.last_scroll += 1;
            let scroll_id = format!("scroll-{}", state.last_scroll);
            state.scrolls.insert(
                scroll_id.clone(),
                ScrollContext {
                    collection,
                    remaining: ids,
                    page_size: request.size.max(1),
                    with_source: request.with_source,
                    expires_at: now + keep_alive,
                },
            );
            scroll_id
        });

        Ok(SearchPage { hits, scroll_id })
    }

    async fn scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> Result<SearchPage, StoreError> {
        self.ensure_online()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.purge_expired_scrolls(now);
        let Some(context) = state.scrolls.get_mut(scroll_id) else {
            return Err(StoreError::Unavailable(format!(
                "no scroll context for `{scroll_id}`"
            )));
        };
        context.expires_at = now + keep_alive;

        let take = context.page_size.min(context.remaining.len());
        let page: Vec<String> = context.remaining.drain(..take).collect();
        let (collection, with_source) = (context.collection, context.with_source);

        // Documents deleted since the snapshot are skipped; keep draining so a
        // page of only-deleted ids does not end the scroll early.
        let mut hits = state.hits(collection, &page, with_source);
        while hits.is_empty() {
            let Some(context) = state.scrolls.get_mut(scroll_id) else {
                break;
            };
            if context.remaining.is_empty() {
                break;
            }
            let take = context.page_size.min(context.remaining.len());
            let page: Vec<String> = context.remaining.drain(..take).collect();
            hits = state.hits(collection, &page, with_source);
        }

        Ok(SearchPage {
            hits,
            scroll_id: Some(scroll_id.to_string()),
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.state.lock().await.scrolls.remove(scroll_id);
        Ok(())
    }

    async fn bulk(
        &self,
        collection: Collection,
        operations: Vec<BulkOperation>,
    ) -> Result<Vec<BulkItemResult>, StoreError> {
        self.ensure_online()?;
        let mut state = self.state.lock().await;
        let results = operations
            .into_iter()
            .map(|operation| match operation {
                BulkOperation::Index {
                    id,
                    body,
                    precondition,
                } => {
                    let status = match state.index(collection, &id, body, precondition) {
                        Ok(version) => BulkStatus::Indexed(version),
                        Err(_) => BulkStatus::Conflict,
                    };
                    BulkItemResult { id, status }
                }
                BulkOperation::Delete { id } => {
                    let status = if state.delete(collection, &id) {
                        BulkStatus::Deleted
                    } else {
                        BulkStatus::NotFound
                    };
                    BulkItemResult { id, status }
                }
            })
            .collect();
        Ok(results)
    }
}
