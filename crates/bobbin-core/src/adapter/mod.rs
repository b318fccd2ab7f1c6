//! Typed documents on top of the `DocumentStore` port.
//!
//! `Documents` is the only place that touches the raw port. It maps record
//! types to collections, (de)serializes bodies, chunks bulk requests, wraps
//! scroll cursors, and runs the bounded read-modify-write loops every
//! cross-worker mutation goes through.

mod retry;
mod scroll;

pub use self::retry::RetryPolicy;
pub use self::scroll::Scroll;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{Result, StorageError};
use crate::ports::{
    BulkItemResult, BulkOperation, BulkStatus, Collection, DocumentStore, Hit, Precondition,
    SearchRequest, StoreError, Version,
};

/// A record type stored one-document-per-id in a fixed collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// A document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: Version,
    pub doc: T,
}

/// Outcome of a conditional write. A conflict is an expected result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Applied(Version),
    Conflict,
}

/// Outcome of `Documents::update`.
#[derive(Debug, Clone, PartialEq)]
pub enum Update<T> {
    Applied(Versioned<T>),
    /// The closure declined to change the document; nothing was written.
    Unchanged(Versioned<T>),
    Missing,
}

#[derive(Clone)]
pub struct Documents {
    store: Arc<dyn DocumentStore>,
    batch_size: usize,
    scroll_keep_alive: Duration,
}

impl Documents {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        batch_size: usize,
        scroll_keep_alive: Duration,
    ) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            scroll_keep_alive,
        }
    }

    pub async fn get<T: Document>(&self, id: &str) -> Result<Option<Versioned<T>>> {
        let Some(raw) = self.store.get(T::COLLECTION, id).await? else {
            return Ok(None);
        };
        let doc = decode_body::<T>(id, raw.body)?;
        Ok(Some(Versioned {
            version: raw.version,
            doc,
        }))
    }

    pub async fn upsert<T: Document>(&self, doc: &T, precondition: Precondition) -> Result<Write> {
        let body = serde_json::to_value(doc).map_err(|e| {
            let what = format!("{}/{}", T::COLLECTION, doc.id());
            StorageError::invalid_argument(format!("{what} cannot be serialized: {e}"))
        })?;
        match self.store.index(T::COLLECTION, doc.id(), body, precondition).await {
            Ok(version) => Ok(Write::Applied(version)),
            Err(StoreError::Conflict { .. }) => Ok(Write::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    /// Unconditional write, for documents only one writer ever touches.
    pub async fn put<T: Document>(&self, doc: &T) -> Result<Version> {
        match self.upsert(doc, Precondition::None).await? {
            Write::Applied(version) => Ok(version),
            Write::Conflict => Err(StorageError::VersionConflict {
                collection: T::COLLECTION,
                id: doc.id().to_string(),
                attempts: 1,
            }),
        }
    }

    /// Idempotent; `true` if a document was removed.
    pub async fn delete<T: Document>(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete(T::COLLECTION, id).await?)
    }

    /// First hit of `request`, with its version.
    pub async fn search_one<T: Document>(
        &self,
        request: SearchRequest,
    ) -> Result<Option<Versioned<T>>> {
        let mut request = request.size(1);
        request.with_source = true;
        request.scroll = None;

        let page = self.store.search(T::COLLECTION, &request).await?;
        let Some(hit) = page.hits.into_iter().next() else {
            return Ok(None);
        };
        let version = hit.version;
        let doc = decode_hit::<T>(hit)?;
        Ok(Some(Versioned { version, doc }))
    }

    /// Open a scrolling search paged by `batch_size`.
    pub async fn scroll_search(
        &self,
        collection: Collection,
        request: SearchRequest,
    ) -> Result<Scroll> {
        let request = request.size(self.batch_size).scroll(self.scroll_keep_alive);
        let first = self.store.search(collection, &request).await?;
        Ok(Scroll::new(Arc::clone(&self.store), self.scroll_keep_alive, first))
    }

    /// Build one bulk operation per item and submit them `batch_size` at a time.
    ///
    /// Items are consumed lazily; at most one batch is held in memory. Returns
    /// the per-item outcomes of every batch, flattened.
    pub async fn bulk_apply<I, F>(
        &self,
        collection: Collection,
        items: I,
        mut build: F,
    ) -> Result<Vec<BulkItemResult>>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        F: FnMut(I::Item) -> BulkOperation + Send,
    {
        let mut results = Vec::new();
        let mut batch = Vec::with_capacity(self.batch_size);

        for item in items {
            batch.push(build(item));
            if batch.len() == self.batch_size {
                let operations = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
                results.extend(self.store.bulk(collection, operations).await?);
            }
        }
        if !batch.is_empty() {
            results.extend(self.store.bulk(collection, batch).await?);
        }

        Ok(results)
    }

    /// Read-modify-write of an existing document, retried on conflict.
    ///
    /// `apply` returns `false` to leave the document untouched. Each retry
    /// re-reads, so `apply` always sees the latest committed state.
    pub async fn update<T, F>(
        &self,
        id: &str,
        retry: &RetryPolicy,
        mut apply: F,
    ) -> Result<Update<T>>
    where
        T: Document,
        F: FnMut(&mut T) -> bool + Send,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let Some(Versioned { version, mut doc }) = self.get::<T>(id).await? else {
                return Ok(Update::Missing);
            };
            if !apply(&mut doc) {
                return Ok(Update::Unchanged(Versioned { version, doc }));
            }
            match self.upsert(&doc, Precondition::Version(version)).await? {
                Write::Applied(version) => return Ok(Update::Applied(Versioned { version, doc })),
                Write::Conflict => self.back_off::<T>(id, retry, attempts).await?,
            }
        }
    }

    /// Like `update`, but creates the document from `create` when absent.
    pub async fn upsert_with<T, N, F>(
        &self,
        id: &str,
        retry: &RetryPolicy,
        mut create: N,
        mut apply: F,
    ) -> Result<Versioned<T>>
    where
        T: Document,
        N: FnMut() -> T + Send,
        F: FnMut(&mut T) + Send,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let (mut doc, precondition) = match self.get::<T>(id).await? {
                Some(current) => (current.doc, Precondition::Version(current.version)),
                None => (create(), Precondition::Absent),
            };
            apply(&mut doc);
            match self.upsert(&doc, precondition).await? {
                Write::Applied(version) => return Ok(Versioned { version, doc }),
                Write::Conflict => self.back_off::<T>(id, retry, attempts).await?,
            }
        }
    }

    async fn back_off<T: Document>(
        &self,
        id: &str,
        retry: &RetryPolicy,
        attempts: u32,
    ) -> Result<()> {
        if retry.is_exhausted(attempts) {
            return Err(StorageError::VersionConflict {
                collection: T::COLLECTION,
                id: id.to_string(),
                attempts,
            });
        }
        let delay = retry.jittered_delay(attempts);
        debug!(collection = %T::COLLECTION, %id, attempts, ?delay, "version conflict, retrying");
        tokio::time::sleep(delay).await;
        Ok(())
    }
}

/// Count bulk items that actually removed a document.
pub fn count_deleted(results: &[BulkItemResult]) -> usize {
    results.iter().filter(|r| r.status == BulkStatus::Deleted).count()
}

/// Decode the body of a search hit; id-only hits are rejected.
pub fn decode_hit<T: Document>(hit: Hit) -> Result<T> {
    let Some(source) = hit.source else {
        return Err(StorageError::StoreUnavailable(format!(
            "{}/{} returned without a body",
            T::COLLECTION,
            hit.id
        )));
    };
    decode_body(&hit.id, source)
}

fn decode_body<T: Document>(id: &str, body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| {
        StorageError::StoreUnavailable(format!("malformed document {}/{id}: {e}", T::COLLECTION))
    })
}
