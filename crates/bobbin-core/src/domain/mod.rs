//! Domain model: the records kept in the document store and the error taxonomy.
//!
//! Every type here is a transient projection of a stored document. Nothing is
//! cached in process; each operation reads and writes through the store.

pub mod collections;
pub mod errors;
pub mod ids;
pub mod invocation;
pub mod job;
pub mod server;
pub mod state;

pub use self::collections::{HashRecord, SetMember, SetRecord};
pub use self::errors::{ErrorKind, Result, StorageError};
pub use self::ids::JobId;
pub use self::invocation::{CodecError, InvocationData};
pub use self::job::{JobData, JobRecord, StateData};
pub use self::server::{ServerContext, ServerRecord};
pub use self::state::FetchState;
