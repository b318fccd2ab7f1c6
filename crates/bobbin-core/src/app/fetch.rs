//! Queue fetch protocol.
//!
//! The store has no blocking dequeue and no cross-document transaction, so a
//! job is claimed by polling for a claimable document and writing
//! `fetched_at = now` conditioned on the version just read. Losing that race
//! is routine: the loser simply waits for the next tick.
//!
//! Ordering is most-recent-first among claimable jobs. That is a fairness
//! approximation only; under heavy contention on one queue older jobs can wait.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapter::{Documents, RetryPolicy, Update, Versioned, Write};
use crate::domain::job::fields;
use crate::domain::{JobRecord, Result, StorageError};
use crate::ports::{Clock, Filter, Precondition, SearchRequest, Sort};

#[derive(Clone)]
pub struct QueueFetcher {
    docs: Documents,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    poll_interval: Duration,
    claim_timeout: chrono::Duration,
}

impl QueueFetcher {
    pub fn new(
        docs: Documents,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        poll_interval: Duration,
        claim_timeout: chrono::Duration,
    ) -> Self {
        Self {
            docs,
            clock,
            retry,
            poll_interval,
            claim_timeout,
        }
    }

    /// Block until a job on one of `queues` is claimed or `cancel` fires.
    ///
    /// Returns `Ok(None)` on cancellation. Cancellation is checked between
    /// polls; a claim already in flight when it fires still completes and the
    /// job is returned. Store failures end the fetch immediately.
    pub async fn fetch_next_job<S: AsRef<str>>(
        &self,
        queues: &[S],
        cancel: &CancellationToken,
    ) -> Result<Option<FetchedJob>> {
        if queues.is_empty() {
            return Err(StorageError::invalid_argument("queues must not be empty"));
        }
        let queues: Vec<&str> = queues.iter().map(AsRef::as_ref).collect();
        if queues.iter().any(|q| q.is_empty()) {
            return Err(StorageError::invalid_argument("queue names must not be empty"));
        }

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            if let Some(job) = self.try_claim(&queues).await? {
                if cancel.is_cancelled() {
                    debug!(job_id = %job.job_id, "claim completed after cancellation");
                }
                return Ok(Some(job));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// One poll: find the newest claimable job and try to claim it.
    async fn try_claim(&self, queues: &[&str]) -> Result<Option<FetchedJob>> {
        // Millisecond precision, matching what the store keeps.
        let now = self.clock.now().trunc_subsecs(3);
        // A claim timeout reaching past the earliest representable time never expires.
        let stale_before = now
            .checked_sub_signed(self.claim_timeout)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let filter = Filter::And(vec![
            Filter::any_of(fields::QUEUE, queues.iter().copied()),
            Filter::Or(vec![
                Filter::missing(fields::FETCHED_AT),
                Filter::less_than(fields::FETCHED_AT, stale_before.timestamp_millis()),
            ]),
        ]);
        let request = SearchRequest::new(filter).sort(Sort::descending(fields::CREATED_AT));

        let found = self.docs.search_one::<JobRecord>(request).await?;
        let Some(Versioned { version, mut doc }) = found else {
            return Ok(None);
        };
        // Search indexes can lag the documents they point at.
        if !doc.fetch_state(now, self.claim_timeout).is_claimable() {
            return Ok(None);
        }
        let Some(queue) = doc.queue.clone() else {
            return Ok(None);
        };
        doc.fetched_at = Some(now);

        match self.docs.upsert(&doc, Precondition::Version(version)).await? {
            Write::Applied(_) => {
                debug!(job_id = %doc.id, %queue, "job claimed");
                Ok(Some(FetchedJob {
                    docs: self.docs.clone(),
                    retry: self.retry.clone(),
                    job_id: doc.id,
                    queue,
                    claimed_at: now,
                }))
            }
            Write::Conflict => {
                debug!(job_id = %doc.id, "claim lost to another worker");
                Ok(None)
            }
        }
    }
}

/// A claimed job. Finish it with `remove_from_queue` or hand it back with
/// `requeue`; a handle that is just dropped leaves the job claimed until the
/// claim times out.
///
/// Both finishing calls only act while this handle still owns the claim, so a
/// worker whose claim went stale and was taken over cannot disturb the new
/// owner.
pub struct FetchedJob {
    docs: Documents,
    retry: RetryPolicy,
    job_id: String,
    queue: String,
    claimed_at: DateTime<Utc>,
}

impl std::fmt::Debug for FetchedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedJob")
            .field("job_id", &self.job_id)
            .field("queue", &self.queue)
            .field("claimed_at", &self.claimed_at)
            .finish_non_exhaustive()
    }
}

impl FetchedJob {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn claimed_at(&self) -> DateTime<Utc> {
        self.claimed_at
    }

    /// Take the job off its queue; the document itself stays. `false` if the
    /// claim was lost or the job is gone.
    pub async fn remove_from_queue(self) -> Result<bool> {
        self.release(|job| {
            job.queue = None;
            job.fetched_at = None;
        })
        .await
    }

    /// Make the job available on its queue again.
    pub async fn requeue(self) -> Result<bool> {
        self.release(|job| job.fetched_at = None).await
    }

    async fn release<F>(self, mut apply: F) -> Result<bool>
    where
        F: FnMut(&mut JobRecord) + Send,
    {
        let claimed_at = self.claimed_at;
        let outcome = self
            .docs
            .update::<JobRecord, _>(&self.job_id, &self.retry, |job| {
                if job.fetched_at != Some(claimed_at) {
                    return false;
                }
                apply(job);
                true
            })
            .await?;

        let released = matches!(outcome, Update::Applied(_));
        if !released {
            debug!(job_id = %self.job_id, "claim no longer held, job left untouched");
        }
        Ok(released)
    }
}
