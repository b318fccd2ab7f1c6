//! Job records and the read-side envelopes built from them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::invocation::{CodecError, InvocationData};
use super::state::FetchState;
use crate::adapter::Document;
use crate::ports::Collection;

/// Recorded state of a job (name, reason, free-form data).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateData {
    pub name: String,
    pub reason: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl StateData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: None,
            data: HashMap::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Stored job document.
///
/// `fetched_at == None` means the job is available to its queue; `queue == None`
/// means it is not on any queue (never enqueued, or removed after processing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default)]
    pub state_data: Option<StateData>,
    #[serde(default)]
    pub invocation: Option<InvocationData>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            queue: None,
            created_at,
            expire_at: None,
            fetched_at: None,
            state_name: None,
            state_data: None,
            invocation: None,
            parameters: HashMap::new(),
        }
    }

    pub fn fetch_state(&self, now: DateTime<Utc>, claim_timeout: chrono::Duration) -> FetchState {
        FetchState::of(self.fetched_at, now, claim_timeout)
    }

    /// Put the job on `queue`, dropping any claim.
    pub fn enqueue(&mut self, queue: impl Into<String>) {
        self.queue = Some(queue.into());
        self.fetched_at = None;
    }

    pub fn record_state(&mut self, state: StateData) {
        self.state_name = Some(state.name.clone());
        self.state_data = Some(state);
    }
}

impl Document for JobRecord {
    const COLLECTION: Collection = Collection::Jobs;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Job envelope returned to the host.
///
/// When the payload cannot be reconstructed `job` is `None` and `load_error`
/// says why; state and timestamps are still filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct JobData<J> {
    pub job: Option<J>,
    pub load_error: Option<CodecError>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl<J> JobData<J> {
    pub fn from_decoded(record: &JobRecord, decoded: Result<J, CodecError>) -> Self {
        let (job, load_error) = match decoded {
            Ok(job) => (Some(job), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            job,
            load_error,
            state: record.state_name.clone(),
            created_at: record.created_at,
        }
    }
}

/// State names written by `WorkerGroup`.
pub mod states {
    pub const PROCESSING: &str = "Processing";
    pub const SUCCEEDED: &str = "Succeeded";
    pub const FAILED: &str = "Failed";
}

pub(crate) mod fields {
    pub const QUEUE: &str = "queue";
    pub const CREATED_AT: &str = "created_at";
    pub const EXPIRE_AT: &str = "expire_at";
    pub const FETCHED_AT: &str = "fetched_at";
}
