//! WorkerGroup - a server process's pool of job workers.
//!
//! Each worker loops: fetch, load, dispatch, record state, remove from queue.
//! A job whose envelope cannot be read because the store failed is requeued
//! for another attempt; a job whose payload cannot be decoded is failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::builder::JobStorage;
use super::connection::StorageConnection;
use super::fetch::FetchedJob;
use crate::domain::job::states;
use crate::domain::{Result, ServerContext, StateData};
use crate::typed::{JobFailure, TypedRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: u64,
    pub failed: u64,
    pub requeued: u64,
}

#[derive(Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    requeued: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
        }
    }
}

enum Processed {
    Succeeded,
    Failed,
    /// Deleted between claim and load.
    Vanished,
}

pub struct WorkerGroup {
    connection: StorageConnection<TypedRegistry>,
    server_id: String,
    queues: Vec<String>,
    workers: usize,
    poll_interval: Duration,
    heartbeat_interval: Duration,
}

impl WorkerGroup {
    pub fn new<I, S>(
        storage: &JobStorage<TypedRegistry>,
        server_id: impl Into<String>,
        queues: I,
        workers: usize,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let poll_interval = storage.options().poll_interval;
        Self {
            connection: storage.connection(),
            server_id: server_id.into(),
            queues: queues.into_iter().map(Into::into).collect(),
            workers: workers.max(1),
            poll_interval,
            heartbeat_interval: Duration::from_secs(30),
        }
    }

    pub fn with_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    /// Announce the server, run the workers until `cancel` fires, then remove
    /// the server record. Jobs already being processed are finished first.
    pub async fn run(self, cancel: CancellationToken) -> Result<WorkerStats> {
        let context = ServerContext::new(self.queues.iter().cloned(), self.workers as u32);
        self.connection.announce_server(&self.server_id, &context).await?;
        info!(
            server_id = %self.server_id,
            workers = self.workers,
            queues = ?self.queues,
            "server started"
        );

        let counters = Arc::new(Counters::default());
        let mut tasks = JoinSet::new();
        for index in 0..self.workers {
            let worker = Worker {
                index,
                connection: self.connection.clone(),
                queues: self.queues.clone(),
                poll_interval: self.poll_interval,
                counters: Arc::clone(&counters),
            };
            tasks.spawn(worker.run(cancel.clone()));
        }
        tasks.spawn(heartbeat(
            self.connection.clone(),
            self.server_id.clone(),
            self.heartbeat_interval,
            cancel.clone(),
        ));

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "worker task ended abnormally");
            }
        }

        self.connection.remove_server(&self.server_id).await?;
        let stats = counters.snapshot();
        info!(server_id = %self.server_id, ?stats, "server stopped");
        Ok(stats)
    }
}

async fn heartbeat(
    connection: StorageConnection<TypedRegistry>,
    server_id: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; announce already stamped the record.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if let Err(err) = connection.heartbeat(&server_id).await {
                    warn!(%server_id, error = %err, "heartbeat failed");
                }
            }
        }
    }
}

struct Worker {
    index: usize,
    connection: StorageConnection<TypedRegistry>,
    queues: Vec<String>,
    poll_interval: Duration,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(self, cancel: CancellationToken) {
        debug!(worker = self.index, "worker started");
        loop {
            let fetched = match self.connection.fetch_next_job(&self.queues, &cancel).await {
                Ok(Some(fetched)) => fetched,
                Ok(None) => break,
                Err(err) => {
                    warn!(worker = self.index, error = %err, "fetch failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                    continue;
                }
            };
            self.finish(fetched).await;
        }
        debug!(worker = self.index, "worker stopped");
    }

    async fn finish(&self, fetched: FetchedJob) {
        let job_id = fetched.job_id().to_string();
        match self.process(&job_id).await {
            Ok(processed) => {
                let counter = match processed {
                    Processed::Succeeded => &self.counters.succeeded,
                    Processed::Failed => &self.counters.failed,
                    Processed::Vanished => return,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                if let Err(err) = fetched.remove_from_queue().await {
                    warn!(%job_id, error = %err, "could not remove job from queue");
                }
            }
            Err(err) => {
                warn!(%job_id, error = %err, "job could not be processed, requeueing");
                self.counters.requeued.fetch_add(1, Ordering::Relaxed);
                if let Err(err) = fetched.requeue().await {
                    warn!(%job_id, error = %err, "requeue failed, job left to claim timeout");
                }
            }
        }
    }

    async fn process(&self, job_id: &str) -> Result<Processed> {
        let Some(data) = self.connection.get_job_data(job_id).await? else {
            return Ok(Processed::Vanished);
        };
        let processing =
            StateData::new(states::PROCESSING).with_data("worker", self.index.to_string());
        self.connection.set_job_state(job_id, processing).await?;

        let outcome = match (data.job, data.load_error) {
            (Some(job), _) => self.connection.codec().dispatch(job).await,
            (None, Some(err)) => Err(JobFailure::new(format!("job could not be loaded: {err}"))),
            (None, None) => Err(JobFailure::new("job has no payload")),
        };

        let (state, processed) = match outcome {
            Ok(()) => (StateData::new(states::SUCCEEDED), Processed::Succeeded),
            Err(failure) => {
                debug!(%job_id, reason = %failure, "job failed");
                (StateData::new(states::FAILED).with_reason(failure.message()), Processed::Failed)
            }
        };
        self.connection.set_job_state(job_id, state).await?;
        Ok(processed)
    }
}
