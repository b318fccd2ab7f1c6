//! Serialized job payloads.
//!
//! The storage never interprets a payload; it hands `InvocationData` to a
//! `JobCodec` and keeps whatever comes back, including a failure.

use serde::{Deserialize, Serialize};

/// Encoded form of a job's callable: which job type to run and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationData {
    pub job_type: String,
    /// Codec-specific encoding of the arguments (JSON for `TypedRegistry`).
    pub arguments: String,
}

impl InvocationData {
    pub fn new(job_type: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            arguments: arguments.into(),
        }
    }
}

/// A payload that could not be encoded or reconstructed.
///
/// On reads this is attached to `JobData` instead of failing the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("job has no invocation payload")]
    MissingPayload,

    #[error("unknown job type `{0}`")]
    UnknownJobType(String),

    #[error("malformed arguments for `{job_type}`: {reason}")]
    MalformedArguments { job_type: String, reason: String },
}
