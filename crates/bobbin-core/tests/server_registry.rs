mod common;

use bobbin_core::StorageError;
use bobbin_core::StorageOptions;
use bobbin_core::domain::ServerContext;
use bobbin_core::ports::Collection;
use chrono::Duration;
use common::Harness;
use rstest::rstest;

#[tokio::test]
async fn announce_twice_keeps_latest_context() {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();

    connection
        .announce_server("server-001", &ServerContext::new(["default"], 4))
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(30));
    connection
        .announce_server("server-001", &ServerContext::new(["critical", "default"], 16))
        .await
        .unwrap();

    let server = connection.get_server("server-001").await.unwrap().unwrap();
    assert_eq!(server.worker_count, 16);
    assert_eq!(server.queues, vec!["critical", "default"]);
    assert_eq!(server.started_at, common::start());
    assert_eq!(server.last_heartbeat, common::start() + Duration::seconds(30));
    assert_eq!(h.store.count(Collection::Servers).await, 1);
}

#[tokio::test]
async fn heartbeat_updates_last_heartbeat() {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();
    connection
        .announce_server("server-001", &ServerContext::new(["default"], 1))
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(1));
    connection.heartbeat("server-001").await.unwrap();

    let server = connection.get_server("server-001").await.unwrap().unwrap();
    assert_eq!(server.last_heartbeat, common::start() + Duration::minutes(1));
}

#[tokio::test]
async fn heartbeat_for_unknown_server_creates_nothing() {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();

    connection.heartbeat("server-404").await.unwrap();

    assert_eq!(connection.get_server("server-404").await.unwrap(), None);
    assert_eq!(h.store.count(Collection::Servers).await, 0);
}

#[rstest]
#[case::heartbeat("heartbeat")]
#[case::remove("remove")]
#[case::get("get")]
#[tokio::test]
async fn empty_server_id_is_rejected(#[case] operation: &str) {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();

    let result = match operation {
        "heartbeat" => connection.heartbeat("").await,
        "remove" => connection.remove_server("").await,
        _ => connection.get_server("").await.map(drop),
    };

    assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
}

#[tokio::test]
async fn reaps_more_servers_than_one_page_can_hold() {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();
    for i in 0..5001 {
        connection
            .announce_server(&format!("stale-{i:05}"), &ServerContext::new(["default"], 1))
            .await
            .unwrap();
    }

    h.clock.advance(Duration::hours(1));
    let removed = connection.remove_timed_out_servers(Duration::minutes(5)).await.unwrap();

    assert_eq!(removed, 5001);
    assert_eq!(h.store.count(Collection::Servers).await, 0);
    assert_eq!(h.store.open_scrolls().await, 0);
}

#[tokio::test]
async fn reaping_spares_fresh_servers() {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();
    for id in ["old-1", "old-2"] {
        connection.announce_server(id, &ServerContext::new(["default"], 1)).await.unwrap();
    }
    h.clock.advance(Duration::minutes(10));
    connection.announce_server("recent", &ServerContext::new(["default"], 1)).await.unwrap();
    // Exactly at the cutoff is not timed out.
    h.clock.advance(Duration::minutes(5));
    connection.announce_server("boundary", &ServerContext::new(["default"], 1)).await.unwrap();
    h.clock.advance(Duration::minutes(5));

    let removed = connection.remove_timed_out_servers(Duration::minutes(5)).await.unwrap();

    assert_eq!(removed, 3);
    assert!(connection.get_server("boundary").await.unwrap().is_some());
    assert!(connection.get_server("recent").await.unwrap().is_none());
}

#[tokio::test]
async fn second_reap_counts_nothing() {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();
    connection.announce_server("server", &ServerContext::new(["default"], 1)).await.unwrap();
    h.clock.advance(Duration::hours(1));

    assert_eq!(connection.remove_timed_out_servers(Duration::minutes(5)).await.unwrap(), 1);
    assert_eq!(connection.remove_timed_out_servers(Duration::minutes(5)).await.unwrap(), 0);
}

#[tokio::test]
async fn negative_timeout_fails_before_touching_the_store() {
    let h = Harness::new(StorageOptions::default());
    h.store.set_online(false);

    let result = h.connection().remove_timed_out_servers(Duration::seconds(-1)).await;

    assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
}

#[tokio::test]
async fn timeout_past_the_calendar_reaps_nothing() {
    let h = Harness::new(StorageOptions::default());
    let connection = h.connection();
    connection
        .announce_server("server", &ServerContext::new(["default"], 1))
        .await
        .unwrap();
    h.clock.advance(Duration::days(365));

    let removed = connection.remove_timed_out_servers(Duration::MAX).await.unwrap();

    assert_eq!(removed, 0);
    assert!(connection.get_server("server").await.unwrap().is_some());
}

#[tokio::test]
async fn unreachable_store_is_reported() {
    let h = Harness::new(StorageOptions::default());
    h.store.set_online(false);

    let result = h
        .connection()
        .announce_server("server-001", &ServerContext::new(["default"], 1))
        .await;

    assert!(matches!(result, Err(StorageError::StoreUnavailable(_))));
}
