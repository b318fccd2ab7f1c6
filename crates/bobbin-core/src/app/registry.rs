//! ServerRegistry - liveness records of worker processes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::adapter::{Document, Documents, RetryPolicy, Update, count_deleted};
use crate::domain::errors::require_non_empty;
use crate::domain::server::fields;
use crate::domain::{Result, ServerContext, ServerRecord, StorageError};
use crate::ports::{BulkOperation, Clock, Filter, SearchRequest};

/// Announce, heartbeat and reap server records.
///
/// A server only ever writes its own record, so announce is an unconditional
/// write. Heartbeat is version-checked so it never resurrects a record a
/// concurrent reaper just deleted.
#[derive(Clone)]
pub struct ServerRegistry {
    docs: Documents,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl ServerRegistry {
    pub fn new(docs: Documents, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self { docs, clock, retry }
    }

    pub async fn announce(&self, server_id: &str, context: &ServerContext) -> Result<()> {
        require_non_empty(server_id, "server_id")?;
        if context.queues.is_empty() {
            return Err(StorageError::invalid_argument(
                "server context must name at least one queue",
            ));
        }

        let now = self.clock.now();
        let mut server = match self.docs.get::<ServerRecord>(server_id).await? {
            Some(existing) => existing.doc,
            None => ServerRecord::new(server_id, now),
        };
        server.apply_context(context, now);
        self.docs.put(&server).await?;

        debug!(
            %server_id,
            workers = context.worker_count,
            queues = ?context.queues,
            "server announced"
        );
        Ok(())
    }

    /// Refresh `last_heartbeat`. An unknown server is left alone; it has to
    /// announce again.
    pub async fn heartbeat(&self, server_id: &str) -> Result<()> {
        require_non_empty(server_id, "server_id")?;

        let now = self.clock.now();
        let outcome = self
            .docs
            .update::<ServerRecord, _>(server_id, &self.retry, |server| {
                server.last_heartbeat = now;
                true
            })
            .await?;
        if matches!(outcome, Update::Missing) {
            debug!(%server_id, "heartbeat for unknown server ignored");
        }
        Ok(())
    }

    pub async fn remove(&self, server_id: &str) -> Result<()> {
        require_non_empty(server_id, "server_id")?;
        self.docs.delete::<ServerRecord>(server_id).await?;
        Ok(())
    }

    pub async fn get(&self, server_id: &str) -> Result<Option<ServerRecord>> {
        require_non_empty(server_id, "server_id")?;
        Ok(self.docs.get::<ServerRecord>(server_id).await?.map(|v| v.doc))
    }

    /// Delete every server whose last heartbeat is older than `timeout`.
    ///
    /// Returns how many records this call actually removed; records already
    /// gone (a concurrent reaper, an explicit remove) are not counted.
    pub async fn remove_timed_out(&self, timeout: chrono::Duration) -> Result<usize> {
        if timeout < chrono::Duration::zero() {
            return Err(StorageError::invalid_argument(format!(
                "timeout must not be negative, got {timeout}"
            )));
        }

        // A timeout reaching past the earliest representable time reaps nothing.
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let silent = Filter::less_than(fields::LAST_HEARTBEAT, cutoff.timestamp_millis());
        let request = SearchRequest::new(silent).ids_only();
        let mut scroll = self.docs.scroll_search(ServerRecord::COLLECTION, request).await?;

        let mut removed = 0;
        while let Some(page) = scroll.next_page().await? {
            let results = self
                .docs
                .bulk_apply(ServerRecord::COLLECTION, page, |hit| BulkOperation::delete(hit.id))
                .await?;
            removed += count_deleted(&results);
        }

        info!(removed, %cutoff, "removed timed out servers");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryDocumentStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn registry() -> ServerRegistry {
        let store = Arc::new(InMemoryDocumentStore::new());
        let docs = Documents::new(store, 1000, Duration::from_secs(60));
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        ServerRegistry::new(docs, Arc::new(clock), RetryPolicy::conflicts())
    }

    #[tokio::test]
    async fn announce_rejects_empty_input() {
        let registry = registry();

        let empty_id = registry.announce("", &ServerContext::new(["default"], 1)).await;
        let context = ServerContext::new(Vec::<String>::new(), 1);
        let no_queues = registry.announce("server", &context).await;

        assert!(matches!(empty_id, Err(StorageError::InvalidArgument(_))));
        assert!(matches!(no_queues, Err(StorageError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = registry();
        registry.announce("server", &ServerContext::new(["default"], 1)).await.unwrap();

        registry.remove("server").await.unwrap();
        registry.remove("server").await.unwrap();

        assert!(registry.get("server").await.unwrap().is_none());
    }
}
