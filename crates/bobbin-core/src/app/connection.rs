//! StorageConnection - the operation surface a worker host calls.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::builder::Inner;
use super::collections::CollectionStore;
use super::fetch::{FetchedJob, QueueFetcher};
use super::jobs::JobStore;
use super::registry::ServerRegistry;
use crate::domain::{
    JobData, JobId, JobRecord, Result, ServerContext, ServerRecord, StateData, StorageError,
};
use crate::ports::JobCodec;

/// One handle over servers, jobs, queues, sets and hashes.
///
/// Holds no state of its own; every call reads and writes through the store.
pub struct StorageConnection<C> {
    servers: ServerRegistry,
    jobs: JobStore<C>,
    fetcher: QueueFetcher,
    collections: CollectionStore,
}

impl<C> Clone for StorageConnection<C> {
    fn clone(&self) -> Self {
        Self {
            servers: self.servers.clone(),
            jobs: self.jobs.clone(),
            fetcher: self.fetcher.clone(),
            collections: self.collections.clone(),
        }
    }
}

impl<C: JobCodec> StorageConnection<C> {
    pub(crate) fn new(inner: &Arc<Inner<C>>) -> Self {
        let retry = inner.options.write_retry.clone();
        Self {
            servers: ServerRegistry::new(
                inner.docs.clone(),
                Arc::clone(&inner.clock),
                retry.clone(),
            ),
            jobs: JobStore::new(
                inner.docs.clone(),
                Arc::clone(&inner.clock),
                Arc::clone(&inner.ids),
                Arc::clone(&inner.codec),
                retry.clone(),
            ),
            fetcher: QueueFetcher::new(
                inner.docs.clone(),
                Arc::clone(&inner.clock),
                retry.clone(),
                inner.options.poll_interval,
                inner.claim_timeout,
            ),
            collections: CollectionStore::new(inner.docs.clone(), retry),
        }
    }

    pub fn codec(&self) -> &Arc<C> {
        self.jobs.codec()
    }

    // Servers

    pub async fn announce_server(&self, server_id: &str, context: &ServerContext) -> Result<()> {
        self.servers.announce(server_id, context).await
    }

    pub async fn heartbeat(&self, server_id: &str) -> Result<()> {
        self.servers.heartbeat(server_id).await
    }

    pub async fn remove_server(&self, server_id: &str) -> Result<()> {
        self.servers.remove(server_id).await
    }

    pub async fn remove_timed_out_servers(&self, timeout: chrono::Duration) -> Result<usize> {
        self.servers.remove_timed_out(timeout).await
    }

    pub async fn get_server(&self, server_id: &str) -> Result<Option<ServerRecord>> {
        self.servers.get(server_id).await
    }

    // Jobs

    pub async fn create_expired_job(
        &self,
        job: &C::Job,
        parameters: HashMap<String, String>,
        created_at: DateTime<Utc>,
        expire_in: chrono::Duration,
    ) -> Result<JobId> {
        self.jobs.create_expired_job(job, parameters, created_at, expire_in).await
    }

    pub async fn enqueue(&self, job_id: &str, queue: &str) -> Result<bool> {
        self.jobs.enqueue(job_id, queue).await
    }

    pub async fn set_job_parameter(&self, job_id: &str, name: &str, value: &str) -> Result<()> {
        self.jobs.set_job_parameter(job_id, name, value).await
    }

    pub async fn get_job_parameter(&self, job_id: &str, name: &str) -> Result<Option<String>> {
        self.jobs.get_job_parameter(job_id, name).await
    }

    pub async fn get_job_data(&self, job_id: &str) -> Result<Option<JobData<C::Job>>> {
        self.jobs.get_job_data(job_id).await
    }

    pub async fn get_state_data(&self, job_id: &str) -> Result<Option<StateData>> {
        self.jobs.get_state_data(job_id).await
    }

    pub async fn set_job_state(&self, job_id: &str, state: StateData) -> Result<bool> {
        self.jobs.set_job_state(job_id, state).await
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.jobs.get_job(job_id).await
    }

    pub async fn remove_expired_jobs(&self) -> Result<usize> {
        self.jobs.remove_expired_jobs().await
    }

    // Queues

    pub async fn fetch_next_job<S: AsRef<str>>(
        &self,
        queues: &[S],
        cancel: &CancellationToken,
    ) -> Result<Option<FetchedJob>> {
        self.fetcher.fetch_next_job(queues, cancel).await
    }

    // Sets and hashes

    pub async fn get_all_items_from_set(&self, key: &str) -> Result<HashSet<String>> {
        self.collections.get_all_items_from_set(key).await
    }

    pub async fn get_first_by_lowest_score_from_set(
        &self,
        key: &str,
        from_score: f64,
        to_score: f64,
    ) -> Result<Option<String>> {
        self.collections
            .get_first_by_lowest_score_from_set(key, from_score, to_score)
            .await
    }

    pub async fn add_to_set(&self, key: &str, value: &str, score: f64) -> Result<()> {
        self.collections.add_to_set(key, value, score).await
    }

    pub async fn set_range_in_hash<I, K, V>(&self, key: &str, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.collections.set_range_in_hash(key, pairs).await
    }

    pub async fn get_all_entries_from_hash(
        &self,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        self.collections.get_all_entries_from_hash(key).await
    }

    // Not provided by this storage

    /// Multi-document write transactions need a protocol this storage does
    /// not implement; always `Unsupported`.
    pub fn create_write_transaction(&self) -> Result<Infallible> {
        Err(StorageError::Unsupported("write transactions"))
    }

    /// Distributed locks need a protocol this storage does not implement;
    /// always `Unsupported`.
    pub fn acquire_distributed_lock(
        &self,
        resource: &str,
        _timeout: Duration,
    ) -> Result<Infallible> {
        crate::domain::errors::require_non_empty(resource, "resource")?;
        Err(StorageError::Unsupported("distributed locks"))
    }
}
