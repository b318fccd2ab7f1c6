mod common;

use std::collections::HashMap;
use std::time::Duration;

use bobbin_core::adapter::Documents;
use bobbin_core::app::{ReapReport, WorkerGroup, WorkerStats};
use bobbin_core::domain::job::states;
use bobbin_core::domain::{InvocationData, JobRecord, ServerContext};
use bobbin_core::ports::Collection;
use bobbin_core::StorageOptions;
use common::{Harness, enqueue_greeting, greet, start};
use tokio_util::sync::CancellationToken;

fn fast_options() -> StorageOptions {
    StorageOptions::default()
        .with_poll_interval(Duration::from_millis(100))
        .with_reaper_interval(Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn workers_finish_every_job_and_record_outcomes() {
    let h = Harness::new(fast_options());
    let connection = h.connection();
    let ada = enqueue_greeting(&connection, "default", "ada", start()).await;
    let grace = enqueue_greeting(&connection, "critical", "grace", start()).await;
    let nobody = enqueue_greeting(&connection, "default", "nobody", start()).await;
    let elsewhere = enqueue_greeting(&connection, "reports", "linus", start()).await;

    let docs = Documents::new(h.store.clone(), 1000, Duration::from_secs(60));
    let mut legacy = JobRecord::new("job-legacy", start());
    legacy.invocation = Some(InvocationData::new("legacy.removed.v1", "{}"));
    docs.put(&legacy).await.unwrap();
    connection.enqueue("job-legacy", "default").await.unwrap();

    let cancel = CancellationToken::new();
    let group = WorkerGroup::new(&h.storage, "server-001", ["default", "critical"], 2);
    let running = tokio::spawn(group.run(cancel.clone()));
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(connection.get_server("server-001").await.unwrap().is_some());
    cancel.cancel();
    let stats = running.await.unwrap().unwrap();

    assert_eq!(
        stats,
        WorkerStats {
            succeeded: 2,
            failed: 2,
            requeued: 0
        }
    );
    let mut greeted = h.greeter.greeted.lock().unwrap().clone();
    greeted.sort();
    assert_eq!(greeted, vec!["ada", "grace"]);

    let expected = [
        (&ada, states::SUCCEEDED),
        (&grace, states::SUCCEEDED),
        (&nobody, states::FAILED),
    ];
    for (job_id, state) in expected {
        let job = connection.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.state_name.as_deref(), Some(state));
        assert_eq!(job.queue, None);
    }
    let failed = connection.get_state_data(&nobody).await.unwrap().unwrap();
    assert_eq!(failed.reason.as_deref(), Some("cannot greet nobody"));
    let legacy = connection.get_state_data("job-legacy").await.unwrap().unwrap();
    assert!(legacy.reason.unwrap().contains("legacy.removed.v1"));

    let untouched = connection.get_job(&elsewhere).await.unwrap().unwrap();
    assert_eq!(untouched.queue.as_deref(), Some("reports"));
    assert_eq!(untouched.state_name, None);

    assert!(connection.get_server("server-001").await.unwrap().is_none());
}

#[tokio::test]
async fn reap_once_clears_dead_servers_and_expired_jobs() {
    let h = Harness::new(fast_options());
    let connection = h.connection();
    connection
        .announce_server("server-dead", &ServerContext::new(["default"], 1))
        .await
        .unwrap();
    connection
        .create_expired_job(&greet("old"), HashMap::new(), start(), chrono::Duration::minutes(1))
        .await
        .unwrap();

    h.clock.advance(chrono::Duration::hours(1));
    connection
        .announce_server("server-alive", &ServerContext::new(["default"], 1))
        .await
        .unwrap();
    let report = h.storage.reaper().reap_once().await.unwrap();

    assert_eq!(report, ReapReport { servers: 1, jobs: 1 });
    assert_eq!(h.store.count(Collection::Servers).await, 1);
    assert_eq!(h.store.count(Collection::Jobs).await, 0);
}

#[tokio::test(start_paused = true)]
async fn reaper_runs_until_cancelled() {
    let h = Harness::new(fast_options());
    let connection = h.connection();
    connection
        .announce_server("server-dead", &ServerContext::new(["default"], 1))
        .await
        .unwrap();
    h.clock.advance(chrono::Duration::hours(1));

    let cancel = CancellationToken::new();
    let reaper = tokio::spawn(h.storage.reaper().run(cancel.clone()));
    tokio::time::sleep(Duration::from_secs(3)).await;
    cancel.cancel();
    reaper.await.unwrap();

    assert_eq!(h.store.count(Collection::Servers).await, 0);
}

#[tokio::test(start_paused = true)]
async fn reaper_survives_store_outages() {
    let h = Harness::new(fast_options());
    h.store.set_online(false);

    let cancel = CancellationToken::new();
    let reaper = tokio::spawn(h.storage.reaper().run(cancel.clone()));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!reaper.is_finished());
    cancel.cancel();

    reaper.await.unwrap();
}
