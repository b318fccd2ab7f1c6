//! DocumentStore port - the capability surface of the backing store.
//!
//! Documents are schemaless JSON bodies keyed by string id inside a
//! `Collection`. Each stored document carries an opaque `Version` that changes
//! on every write; conditional writes compare against it.
//!
//! The port carries no business logic. Typed access, chunking and retry loops
//! live in `crate::adapter`.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::query::SearchRequest;

/// One collection per record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Servers,
    Jobs,
    Sets,
    Hashes,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Servers => "servers",
            Collection::Jobs => "jobs",
            Collection::Sets => "sets",
            Collection::Hashes => "hashes",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimistic-concurrency token handed out by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Condition a write must satisfy to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Last writer wins.
    None,
    /// Only create; fails if the id exists.
    Absent,
    /// Only overwrite the exact version last observed; fails if the document
    /// changed or was deleted since.
    Version(Version),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub version: Version,
    pub body: Value,
}

/// One search result. `source` is `None` for id-only searches.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub version: Version,
    pub source: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<Hit>,
    /// Cursor for the next page, present when the search was opened as a scroll.
    pub scroll_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    Index {
        id: String,
        body: Value,
        precondition: Precondition,
    },
    Delete {
        id: String,
    },
}

impl BulkOperation {
    pub fn delete(id: impl Into<String>) -> Self {
        BulkOperation::Delete { id: id.into() }
    }

    pub fn id(&self) -> &str {
        match self {
            BulkOperation::Index { id, .. } | BulkOperation::Delete { id } => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkStatus {
    Indexed(Version),
    Deleted,
    NotFound,
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    pub id: String,
    pub status: BulkStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A conditional write did not match the stored version.
    #[error("version conflict on {collection}/{id}")]
    Conflict { collection: Collection, id: String },

    /// Unreachable store or invalid response.
    #[error("{0}")]
    Unavailable(String),
}

/// Capability surface every backend must provide.
///
/// # Contract
/// - `get` never blocks indefinitely
/// - `index` honours the precondition atomically per document
/// - `delete` is idempotent and reports whether a document was removed
/// - `search` with `request.scroll` set opens a cursor continued by `scroll`
///   until an empty page comes back; `clear_scroll` releases it early
/// - `bulk` applies every operation independently and reports each outcome
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<RawDocument>, StoreError>;

    async fn index(
        &self,
        collection: Collection,
        id: &str,
        body: Value,
        precondition: Precondition,
    ) -> Result<Version, StoreError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    async fn search(
        &self,
        collection: Collection,
        request: &SearchRequest,
    ) -> Result<SearchPage, StoreError>;

    async fn scroll(&self, scroll_id: &str, keep_alive: Duration) -> Result<SearchPage, StoreError>;

    async fn clear_scroll(&self, scroll_id: &str) -> Result<(), StoreError>;

    async fn bulk(
        &self,
        collection: Collection,
        operations: Vec<BulkOperation>,
    ) -> Result<Vec<BulkItemResult>, StoreError>;
}
