//! Impls - port implementations shipped with the crate.
//!
//! Network backends live in their own crates and implement
//! `ports::DocumentStore` the same way.

mod matcher;
pub mod memory;

pub use self::memory::InMemoryDocumentStore;
