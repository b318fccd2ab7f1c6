use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bobbin_core::StorageError;
use bobbin_core::adapter::{Documents, RetryPolicy, Update, Write, count_deleted, decode_hit};
use bobbin_core::domain::HashRecord;
use bobbin_core::impls::InMemoryDocumentStore;
use bobbin_core::ports::{
    BulkItemResult, BulkOperation, Collection, DocumentStore, Filter, Precondition, RawDocument,
    SearchPage, SearchRequest, StoreError, Version,
};
use serde_json::Value;

async fn seed_hashes(docs: &Documents, count: usize) {
    for i in 0..count {
        let mut hash = HashRecord::new(format!("hash-{i:05}"));
        hash.merge([("n".to_string(), i.to_string())]);
        docs.put(&hash).await.unwrap();
    }
}

#[tokio::test]
async fn scroll_walks_every_match_with_bounded_pages() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let docs = Documents::new(store.clone(), 1000, Duration::from_secs(60));
    seed_hashes(&docs, 5001).await;

    let mut scroll = docs
        .scroll_search(Collection::Hashes, SearchRequest::new(Filter::MatchAll))
        .await
        .unwrap();
    let mut seen = 0;
    let mut largest_page = 0;
    while let Some(page) = scroll.next_page().await.unwrap() {
        largest_page = largest_page.max(page.len());
        for hit in page {
            let hash: HashRecord = decode_hit(hit).unwrap();
            assert!(hash.fields.contains_key("n"));
            seen += 1;
        }
    }

    assert_eq!(seen, 5001);
    assert_eq!(largest_page, 1000);
    assert_eq!(store.open_scrolls().await, 0);
    assert!(scroll.next().await.unwrap().is_none());
}

#[tokio::test]
async fn single_page_cannot_hold_everything() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let request = SearchRequest::new(Filter::MatchAll).size(5001);

    let result = store.search(Collection::Hashes, &request).await;

    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn bulk_apply_chunks_and_reports_every_item() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let docs = Documents::new(store.clone(), 1000, Duration::from_secs(60));
    seed_hashes(&docs, 2500).await;

    let ids = (0..2600).map(|i| format!("hash-{i:05}"));
    let results = docs
        .bulk_apply(Collection::Hashes, ids, |id: String| BulkOperation::delete(id))
        .await
        .unwrap();

    assert_eq!(results.len(), 2600);
    assert_eq!(count_deleted(&results), 2500);
    assert_eq!(store.count(Collection::Hashes).await, 0);
}

#[tokio::test]
async fn stale_version_is_a_conflict_result() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let docs = Documents::new(store, 1000, Duration::from_secs(60));
    let hash = HashRecord::new("h");
    let Write::Applied(first) = docs.upsert(&hash, Precondition::Absent).await.unwrap() else {
        panic!("first write should apply");
    };
    docs.put(&hash).await.unwrap();

    let stale = docs.upsert(&hash, Precondition::Version(first)).await.unwrap();

    assert_eq!(stale, Write::Conflict);
}

/// Store whose conditional writes always lose.
struct AlwaysConflicts(InMemoryDocumentStore);

#[async_trait]
impl DocumentStore for AlwaysConflicts {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<RawDocument>, StoreError> {
        self.0.get(collection, id).await
    }

    async fn index(
        &self,
        collection: Collection,
        id: &str,
        body: Value,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        match precondition {
            Precondition::Version(_) => Err(StoreError::Conflict {
                collection,
                id: id.to_string(),
            }),
            _ => self.0.index(collection, id, body, precondition).await,
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        self.0.delete(collection, id).await
    }

    async fn search(
        &self,
        collection: Collection,
        request: &SearchRequest,
    ) -> Result<SearchPage, StoreError> {
        self.0.search(collection, request).await
    }

    async fn scroll(
        &self,
        scroll_id: &str,
        keep_alive: Duration,
    ) -> Result<SearchPage, StoreError> {
        self.0.scroll(scroll_id, keep_alive).await
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError> {
        self.0.clear_scroll(scroll_id).await
    }

    async fn bulk(
        &self,
        collection: Collection,
        operations: Vec<BulkOperation>,
    ) -> Result<Vec<BulkItemResult>, StoreError> {
        self.0.bulk(collection, operations).await
    }
}

#[tokio::test(start_paused = true)]
async fn update_gives_up_after_the_retry_budget() {
    let docs = Documents::new(
        Arc::new(AlwaysConflicts(InMemoryDocumentStore::new())),
        1000,
        Duration::from_secs(60),
    );
    docs.put(&HashRecord::new("h")).await.unwrap();
    let retry = RetryPolicy {
        max_attempts: 3,
        ..RetryPolicy::conflicts()
    };

    let mut calls = 0;
    let result = docs
        .update::<HashRecord, _>("h", &retry, |hash| {
            calls += 1;
            hash.fields.insert("k".into(), "v".into());
            true
        })
        .await;

    assert!(matches!(
        result,
        Err(StorageError::VersionConflict { collection: Collection::Hashes, attempts: 3, .. })
    ));
    assert_eq!(calls, 3);
}

#[tokio::test]
async fn update_that_changes_nothing_writes_nothing() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let docs = Documents::new(store, 1000, Duration::from_secs(60));
    let written = docs.upsert(&HashRecord::new("h"), Precondition::None).await.unwrap();
    let Write::Applied(version) = written else {
        panic!("unconditional write should apply");
    };

    let outcome = docs
        .update::<HashRecord, _>("h", &RetryPolicy::conflicts(), |_| false)
        .await
        .unwrap();

    assert!(matches!(outcome, Update::Unchanged(current) if current.version == version));
}
