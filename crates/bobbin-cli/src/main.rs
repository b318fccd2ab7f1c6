//! bobbin CLI - runs the job storage end to end against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bobbin_core::app::WorkerGroup;
use bobbin_core::domain::ServerContext;
use bobbin_core::domain::job::states;
use bobbin_core::impls::InMemoryDocumentStore;
use bobbin_core::observability;
use bobbin_core::ports::{Collection, FixedClock};
use bobbin_core::typed::{Handler, JobFailure, Task, TypedJob, TypedRegistry};
use bobbin_core::{StorageBuilder, StorageOptions};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "bobbin", about = "Job storage over a versioned document store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enqueue jobs and let a worker group process them
    Demo {
        /// Concurrent workers
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Jobs to enqueue
        #[arg(long, default_value_t = 20)]
        jobs: u32,
        /// Queues to spread jobs over (repeatable)
        #[arg(long = "queue", default_values_t = ["default".to_string()])]
        queues: Vec<String>,
        /// Fetch poll interval
        #[arg(long, default_value_t = 200)]
        poll_interval_ms: u64,
        /// Fail every Nth job (0 = never)
        #[arg(long, default_value_t = 0)]
        fail_every: u32,
        /// Server heartbeat period
        #[arg(long, default_value_t = 30)]
        heartbeat_secs: u64,
    },
    /// Announce stale servers and reap them
    Reap {
        /// Stale servers to announce
        #[arg(long, default_value_t = 5001)]
        servers: u32,
        /// Heartbeat timeout
        #[arg(long, default_value_t = 300)]
        timeout_secs: i64,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct RenderPage {
    page: u32,
}

impl Task for RenderPage {
    const TYPE: &'static str = "demo.render_page.v1";
}

struct RenderHandler {
    fail_every: u32,
    rendered: AtomicU32,
}

#[async_trait]
impl Handler<RenderPage> for RenderHandler {
    async fn handle(&self, task: RenderPage) -> Result<(), JobFailure> {
        if self.fail_every > 0 && task.page % self.fail_every == 0 {
            return Err(JobFailure::new(format!("page {} failed to render", task.page)));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.rendered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Demo {
            workers,
            jobs,
            queues,
            poll_interval_ms,
            fail_every,
            heartbeat_secs,
        } => {
            let demo = Demo {
                workers,
                jobs,
                queues,
                poll_interval: Duration::from_millis(poll_interval_ms),
                fail_every,
                heartbeat: Duration::from_secs(heartbeat_secs),
            };
            cmd_demo(demo).await
        }
        Command::Reap { servers, timeout_secs } => cmd_reap(servers, timeout_secs).await,
    }
}

struct Demo {
    workers: usize,
    jobs: u32,
    queues: Vec<String>,
    poll_interval: Duration,
    fail_every: u32,
    heartbeat: Duration,
}

async fn cmd_demo(demo: Demo) -> anyhow::Result<()> {
    let Demo {
        workers,
        jobs,
        queues,
        poll_interval,
        fail_every,
        heartbeat,
    } = demo;
    anyhow::ensure!(!queues.is_empty(), "at least one --queue is required");

    let registry = TypedRegistry::new().with::<RenderPage, _>(RenderHandler {
        fail_every,
        rendered: AtomicU32::new(0),
    })?;
    registry.expect(&[RenderPage::TYPE])?;

    let options = StorageOptions::default().with_poll_interval(poll_interval);
    let storage = StorageBuilder::new(Arc::new(InMemoryDocumentStore::new()), registry)
        .options(options)
        .build()?;
    let connection = storage.connection();

    let mut job_ids = Vec::with_capacity(jobs as usize);
    for page in 1..=jobs {
        let job = TypedJob::new(&RenderPage { page })?;
        let id = connection
            .create_expired_job(&job, HashMap::new(), Utc::now(), chrono::Duration::days(1))
            .await?
            .to_string();
        let queue = &queues[(page as usize - 1) % queues.len()];
        connection.enqueue(&id, queue).await?;
        job_ids.push(id);
    }
    info!(jobs, ?queues, "jobs enqueued");

    let started = Instant::now();
    let cancel = CancellationToken::new();
    let group = WorkerGroup::new(&storage, "bobbin-demo", queues.clone(), workers)
        .with_heartbeat_interval(heartbeat);
    let running = tokio::spawn(group.run(cancel.clone()));
    let reaper = tokio::spawn(storage.reaper().run(cancel.clone()));

    loop {
        let mut finished = 0;
        for id in &job_ids {
            let state = connection.get_state_data(id).await?;
            if state.is_some_and(|s| s.name == states::SUCCEEDED || s.name == states::FAILED) {
                finished += 1;
            }
        }
        if finished == job_ids.len() {
            break;
        }
        tokio::time::sleep(poll_interval).await;
    }

    cancel.cancel();
    let stats = running.await??;
    reaper.await?;

    println!(
        "processed {} jobs in {:?}: succeeded={} failed={} requeued={}",
        job_ids.len(),
        started.elapsed(),
        stats.succeeded,
        stats.failed,
        stats.requeued
    );
    Ok(())
}

async fn cmd_reap(servers: u32, timeout_secs: i64) -> anyhow::Result<()> {
    let store = Arc::new(InMemoryDocumentStore::new());

    // Announce through a clock stuck an hour in the past.
    let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
    let past = StorageBuilder::new(store.clone(), TypedRegistry::new())
        .clock(Arc::new(FixedClock::new(an_hour_ago)))
        .build()?
        .connection();
    for i in 0..servers {
        past.announce_server(&format!("server-{i:05}"), &ServerContext::new(["default"], 1))
            .await?;
    }

    let present = StorageBuilder::new(store.clone(), TypedRegistry::new())
        .build()?
        .connection();
    let timeout = chrono::Duration::try_seconds(timeout_secs)
        .ok_or_else(|| anyhow::anyhow!("--timeout-secs {timeout_secs} is out of range"))?;
    let started = Instant::now();
    let removed = present.remove_timed_out_servers(timeout).await?;

    println!(
        "announced {servers} servers, reaped {removed} in {:?}, {} left",
        started.elapsed(),
        store.count(Collection::Servers).await
    );
    Ok(())
}
