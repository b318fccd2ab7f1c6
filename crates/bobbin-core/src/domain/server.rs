//! Server records: one document per live worker process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter::Document;
use crate::ports::Collection;

/// What a server reports about itself on announce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerContext {
    pub queues: Vec<String>,
    pub worker_count: u32,
}

impl ServerContext {
    pub fn new<I, S>(queues: I, worker_count: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queues: queues.into_iter().map(Into::into).collect(),
            worker_count,
        }
    }
}

/// Stored server document.
///
/// Timestamps are stored as epoch milliseconds so range filters compare numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_heartbeat: DateTime<Utc>,
    pub worker_count: u32,
    #[serde(default)]
    pub queues: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
}

impl ServerRecord {
    /// Fresh record for a server announcing itself for the first time.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            last_heartbeat: now,
            worker_count: 0,
            queues: Vec::new(),
            started_at: now,
        }
    }

    pub fn apply_context(&mut self, context: &ServerContext, now: DateTime<Utc>) {
        self.last_heartbeat = now;
        self.worker_count = context.worker_count;
        self.queues = context.queues.clone();
    }
}

impl Document for ServerRecord {
    const COLLECTION: Collection = Collection::Servers;

    fn id(&self) -> &str {
        &self.id
    }
}

pub(crate) mod fields {
    pub const LAST_HEARTBEAT: &str = "last_heartbeat";
}
