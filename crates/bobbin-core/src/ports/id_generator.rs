//! IdGenerator port - job id generation.
//!
//! Ids are generated by whichever worker creates the job, without coordination,
//! so creation can use an unconditional write.

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::JobId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_job_id(&self) -> JobId;
}

/// ULID ids whose timestamp part comes from the injected clock.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_job_id(&self) -> JobId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        JobId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
