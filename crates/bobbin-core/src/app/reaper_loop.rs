//! ReaperLoop - periodic cleanup of dead servers and expired jobs.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::connection::StorageConnection;
use crate::domain::Result;
use crate::ports::JobCodec;

/// Counts from one reaping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub servers: usize,
    pub jobs: usize,
}

/// Every `interval`: remove servers silent for longer than `server_timeout`,
/// then jobs past their `expire_at`.
///
/// Any number of processes may run one; deletes are idempotent and each
/// removal is counted by exactly one of them.
pub struct ReaperLoop<C> {
    connection: StorageConnection<C>,
    server_timeout: chrono::Duration,
    interval: Duration,
}

impl<C: JobCodec> ReaperLoop<C> {
    pub fn new(
        connection: StorageConnection<C>,
        server_timeout: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            connection,
            server_timeout,
            interval,
        }
    }

    pub async fn reap_once(&self) -> Result<ReapReport> {
        let servers = self.connection.remove_timed_out_servers(self.server_timeout).await?;
        let jobs = self.connection.remove_expired_jobs().await?;
        Ok(ReapReport { servers, jobs })
    }

    /// Reap until `cancel` fires. A failed pass is logged and retried on the
    /// next tick.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "reaper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.reap_once().await {
                        warn!(error = %err, kind = ?err.kind(), "reaping failed");
                    }
                }
            }
        }

        info!("reaper stopped");
    }
}
