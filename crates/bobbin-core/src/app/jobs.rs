//! JobStore - job documents: creation, parameters, state, expiry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::adapter::{Document, Documents, RetryPolicy, Update, count_deleted};
use crate::domain::errors::require_non_empty;
use crate::domain::job::fields;
use crate::domain::{CodecError, JobData, JobId, JobRecord, Result, StateData, StorageError};
use crate::ports::{BulkOperation, Clock, Filter, IdGenerator, JobCodec, SearchRequest};

/// Reads and writes job documents.
///
/// Every mutation of an existing job is a version-checked read-modify-write;
/// only creation, which owns a freshly generated id, writes unconditionally.
pub struct JobStore<C> {
    docs: Documents,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    codec: Arc<C>,
    retry: RetryPolicy,
}

impl<C> Clone for JobStore<C> {
    fn clone(&self) -> Self {
        Self {
            docs: self.docs.clone(),
            clock: Arc::clone(&self.clock),
            ids: Arc::clone(&self.ids),
            codec: Arc::clone(&self.codec),
            retry: self.retry.clone(),
        }
    }
}

impl<C: JobCodec> JobStore<C> {
    pub fn new(
        docs: Documents,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        codec: Arc<C>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            docs,
            clock,
            ids,
            codec,
            retry,
        }
    }

    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }

    /// Store a new job that expires `expire_in` after `created_at`.
    ///
    /// The job is not on any queue yet; see [`JobStore::enqueue`].
    pub async fn create_expired_job(
        &self,
        job: &C::Job,
        parameters: HashMap<String, String>,
        created_at: DateTime<Utc>,
        expire_in: chrono::Duration,
    ) -> Result<JobId> {
        if expire_in < chrono::Duration::zero() {
            return Err(StorageError::invalid_argument(format!(
                "expire_in must not be negative, got {expire_in}"
            )));
        }
        if parameters.keys().any(String::is_empty) {
            return Err(StorageError::invalid_argument("parameter names must not be empty"));
        }
        let expire_at = created_at.checked_add_signed(expire_in).ok_or_else(|| {
            StorageError::invalid_argument(format!("expire_in {expire_in} is out of range"))
        })?;
        let invocation = self
            .codec
            .encode(job)
            .map_err(|e| StorageError::invalid_argument(format!("job cannot be encoded: {e}")))?;

        let id = self.ids.generate_job_id();
        let mut record = JobRecord::new(id.to_string(), created_at);
        record.expire_at = Some(expire_at);
        record.invocation = Some(invocation);
        record.parameters = parameters;
        self.docs.put(&record).await?;

        debug!(job_id = %id, "job created");
        Ok(id)
    }

    /// Put a job on `queue`, dropping any claim. `false` if the job does not exist.
    pub async fn enqueue(&self, job_id: &str, queue: &str) -> Result<bool> {
        require_non_empty(job_id, "job_id")?;
        require_non_empty(queue, "queue")?;

        let outcome = self
            .docs
            .update::<JobRecord, _>(job_id, &self.retry, |job| {
                job.enqueue(queue);
                true
            })
            .await?;
        Ok(!matches!(outcome, Update::Missing))
    }

    /// Set one parameter; a missing job is left alone.
    pub async fn set_job_parameter(&self, job_id: &str, name: &str, value: &str) -> Result<()> {
        require_non_empty(job_id, "job_id")?;
        require_non_empty(name, "name")?;

        self.docs
            .update::<JobRecord, _>(job_id, &self.retry, |job| {
                if job.parameters.get(name).map(String::as_str) == Some(value) {
                    return false;
                }
                job.parameters.insert(name.to_string(), value.to_string());
                true
            })
            .await?;
        Ok(())
    }

    pub async fn get_job_parameter(&self, job_id: &str, name: &str) -> Result<Option<String>> {
        require_non_empty(job_id, "job_id")?;
        require_non_empty(name, "name")?;

        let job = self.docs.get::<JobRecord>(job_id).await?;
        Ok(job.and_then(|mut job| job.doc.parameters.remove(name)))
    }

    /// Job envelope with its decoded payload.
    ///
    /// A payload the codec cannot rebuild is reported in `load_error`; the
    /// call itself still succeeds.
    pub async fn get_job_data(&self, job_id: &str) -> Result<Option<JobData<C::Job>>> {
        require_non_empty(job_id, "job_id")?;

        let Some(job) = self.docs.get::<JobRecord>(job_id).await? else {
            return Ok(None);
        };
        let decoded = match &job.doc.invocation {
            Some(invocation) => self.codec.decode(invocation),
            None => Err(CodecError::MissingPayload),
        };
        if let Err(err) = &decoded {
            debug!(%job_id, error = %err, "job payload could not be loaded");
        }
        Ok(Some(JobData::from_decoded(&job.doc, decoded)))
    }

    /// `None` if the job is missing or has no recorded state yet.
    pub async fn get_state_data(&self, job_id: &str) -> Result<Option<StateData>> {
        require_non_empty(job_id, "job_id")?;

        let job = self.docs.get::<JobRecord>(job_id).await?;
        Ok(job.and_then(|job| job.doc.state_data))
    }

    /// Record a new state. `false` if the job does not exist.
    pub async fn set_job_state(&self, job_id: &str, state: StateData) -> Result<bool> {
        require_non_empty(job_id, "job_id")?;
        require_non_empty(&state.name, "state.name")?;

        let outcome = self
            .docs
            .update::<JobRecord, _>(job_id, &self.retry, |job| {
                job.record_state(state.clone());
                true
            })
            .await?;
        Ok(!matches!(outcome, Update::Missing))
    }

    /// The raw job document.
    pub async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        require_non_empty(job_id, "job_id")?;
        Ok(self.docs.get::<JobRecord>(job_id).await?.map(|v| v.doc))
    }

    /// Delete every job whose `expire_at` has passed; returns how many were removed.
    pub async fn remove_expired_jobs(&self) -> Result<usize> {
        let now = self.clock.now();
        let expired = Filter::less_than(fields::EXPIRE_AT, now.timestamp_millis());
        let request = SearchRequest::new(expired).ids_only();
        let mut scroll = self.docs.scroll_search(JobRecord::COLLECTION, request).await?;

        let mut removed = 0;
        while let Some(page) = scroll.next_page().await? {
            let results = self
                .docs
                .bulk_apply(JobRecord::COLLECTION, page, |hit| BulkOperation::delete(hit.id))
                .await?;
            removed += count_deleted(&results);
        }

        info!(removed, "removed expired jobs");
        Ok(removed)
    }
}
