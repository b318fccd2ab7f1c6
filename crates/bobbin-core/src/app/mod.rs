//! App - operations built from the ports.
//!
//! # Components
//! - **StorageBuilder / JobStorage**: wiring and fail-fast option validation
//! - **StorageConnection**: the full operation surface handed to a host
//! - **ServerRegistry**: announce, heartbeat, reap servers
//! - **JobStore**: job creation, parameters, state, expiry
//! - **QueueFetcher**: polling claim loop and the `FetchedJob` handle
//! - **CollectionStore**: scored sets and string hashes
//! - **ReaperLoop**: periodic server and job cleanup
//! - **WorkerGroup**: fetch, dispatch and finish jobs with typed handlers

pub mod builder;
pub mod collections;
pub mod connection;
pub mod fetch;
pub mod jobs;
pub mod options;
pub mod reaper_loop;
pub mod registry;
pub mod worker_loop;

pub use self::builder::{JobStorage, StorageBuilder};
pub use self::collections::CollectionStore;
pub use self::connection::StorageConnection;
pub use self::fetch::{FetchedJob, QueueFetcher};
pub use self::jobs::JobStore;
pub use self::options::StorageOptions;
pub use self::reaper_loop::{ReapReport, ReaperLoop};
pub use self::registry::ServerRegistry;
pub use self::worker_loop::{WorkerGroup, WorkerStats};
