//! Ports - the seams to the outside world.
//!
//! - `DocumentStore`: any backend with per-document optimistic versioning,
//!   scrolling search and bulk operations
//! - `Clock`, `IdGenerator`: swapped for deterministic versions in tests
//! - `JobCodec`: payload serialization, owned by the host

pub mod clock;
pub mod document_store;
pub mod id_generator;
pub mod job_codec;
pub mod query;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::document_store::{
    BulkItemResult, BulkOperation, BulkStatus, Collection, DocumentStore, Hit, Precondition,
    RawDocument, SearchPage, StoreError, Version,
};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_codec::JobCodec;
pub use self::query::{Filter, SearchRequest, Sort, SortOrder};
