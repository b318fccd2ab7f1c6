//! Typed - typed job payloads.
//!
//! Job type names come from `Task::TYPE`, so a typo is a compile error rather
//! than a job nobody handles.
//!
//! # Two layers
//! - **Typed**: `Task`, `Handler<T>` - what hosts implement
//! - **Erased**: `DynHandler`, `TypedJob` - what gets stored and dispatched

pub mod handler;
pub mod registry;
pub mod task;

pub use self::handler::{DynHandler, Handler, JobFailure};
pub use self::registry::{RegistryError, TypedRegistry};
pub use self::task::{Task, TypedJob};
