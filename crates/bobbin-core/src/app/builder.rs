//! StorageBuilder - wiring of the store, clock, id generator and codec.
//!
//! Options are validated once, at `build()`, so a misconfigured host fails on
//! startup instead of on its first poll.

use std::sync::Arc;

use super::connection::StorageConnection;
use super::options::{StorageOptions, chrono_duration};
use super::reaper_loop::ReaperLoop;
use crate::adapter::Documents;
use crate::domain::Result;
use crate::ports::{Clock, DocumentStore, IdGenerator, JobCodec, SystemClock, UlidGenerator};

/// Builds a [`JobStorage`].
///
/// ```ignore
/// let storage = StorageBuilder::new(Arc::new(InMemoryDocumentStore::new()), registry)
///     .options(StorageOptions::default().with_poll_interval(Duration::from_secs(1)))
///     .build()?;
/// let connection = storage.connection();
/// ```
pub struct StorageBuilder<C> {
    store: Arc<dyn DocumentStore>,
    codec: C,
    options: StorageOptions,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl<C: JobCodec> StorageBuilder<C> {
    pub fn new(store: Arc<dyn DocumentStore>, codec: C) -> Self {
        Self {
            store,
            codec,
            options: StorageOptions::default(),
            clock: None,
            ids: None,
        }
    }

    pub fn options(mut self, options: StorageOptions) -> Self {
        self.options = options;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate options and assemble the storage.
    ///
    /// Without an explicit clock the system clock is used; without an id
    /// generator, ULIDs stamped by that clock.
    pub fn build(self) -> Result<JobStorage<C>> {
        self.options.validate()?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let docs = Documents::new(
            self.store,
            self.options.batch_size,
            self.options.scroll_keep_alive,
        );

        Ok(JobStorage {
            inner: Arc::new(Inner {
                docs,
                clock,
                ids,
                codec: Arc::new(self.codec),
                claim_timeout: chrono_duration("claim_timeout", self.options.claim_timeout)?,
                server_timeout: chrono_duration("server_timeout", self.options.server_timeout)?,
                options: self.options,
            }),
        })
    }
}

pub(crate) struct Inner<C> {
    pub(crate) docs: Documents,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) codec: Arc<C>,
    pub(crate) options: StorageOptions,
    pub(crate) claim_timeout: chrono::Duration,
    pub(crate) server_timeout: chrono::Duration,
}

/// A configured job storage. Cheap to clone; hand one to every worker.
pub struct JobStorage<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for JobStorage<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: JobCodec> JobStorage<C> {
    pub fn options(&self) -> &StorageOptions {
        &self.inner.options
    }

    pub fn codec(&self) -> &Arc<C> {
        &self.inner.codec
    }

    /// A connection holds no resources beyond shared handles; open as many as needed.
    pub fn connection(&self) -> StorageConnection<C> {
        StorageConnection::new(&self.inner)
    }

    /// Periodic reaper for timed-out servers and expired jobs.
    pub fn reaper(&self) -> ReaperLoop<C> {
        ReaperLoop::new(
            self.connection(),
            self.inner.server_timeout,
            self.inner.options.reaper_interval,
        )
    }
}
