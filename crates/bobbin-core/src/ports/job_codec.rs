//! JobCodec port - payload serialization owned by the host.

use crate::domain::{CodecError, InvocationData};

/// Turns a host job into `InvocationData` and back.
///
/// `decode` failures are not storage errors: readers attach them to the
/// returned `JobData` so callers still see the job's state and timestamps.
pub trait JobCodec: Send + Sync + 'static {
    type Job: Send + Sync + 'static;

    fn encode(&self, job: &Self::Job) -> Result<InvocationData, CodecError>;

    fn decode(&self, data: &InvocationData) -> Result<Self::Job, CodecError>;
}
