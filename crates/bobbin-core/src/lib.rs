//! bobbin-core
//!
//! Job storage over a document store that only offers per-document optimistic
//! versioning. Workers share the store to enqueue jobs, claim each job at most
//! once, track job state, and evict servers that stopped heartbeating.
//!
//! # Modules
//! - **domain**: records (servers, jobs, sets, hashes), ids and errors
//! - **ports**: the document store capability surface, clock, id generator, job codec
//! - **adapter**: typed documents on top of the store port (scrolling, bulk, retry loops)
//! - **impls**: `InMemoryDocumentStore`, the reference backend
//! - **app**: server registry, job store, fetch protocol, collections, facade and loops
//! - **typed**: typed job payloads (`Task`, `Handler`, `TypedRegistry`)

pub mod adapter;
pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

pub use self::app::{JobStorage, StorageBuilder, StorageConnection, StorageOptions};
pub use self::domain::{ErrorKind, Result, StorageError};
