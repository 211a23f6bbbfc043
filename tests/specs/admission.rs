//! Per-destination admission control specs across worker connections

use crate::prelude::*;

#[tokio::test]
async fn a_destination_at_its_limit_is_withheld_from_all_workers() {
    let daemon = TestDaemon::start_with_limit(1).await;
    daemon.seed("abc", "mx.example.com");
    daemon.seed("def", "mx.example.com");

    let worker_a = daemon.connect().await;
    let worker_b = daemon.connect().await;

    let first = worker_a.next_delivery("default").await.unwrap().unwrap();
    assert_eq!(first.id, "abc");

    // The destination is saturated; another worker gets nothing even though
    // a job is queued.
    let blocked = worker_b.next_delivery("default").await.unwrap();
    assert!(blocked.is_none());

    // Releasing the claim frees the slot for the other worker.
    worker_a
        .release("default", &first.id, &first.seq, first.lock_token)
        .await
        .unwrap();

    let second = worker_b.next_delivery("default").await.unwrap().unwrap();
    assert_eq!(second.id, "def");
}

#[tokio::test]
async fn independent_destinations_are_not_blocked() {
    let daemon = TestDaemon::start_with_limit(1).await;
    daemon.seed("abc", "mx.example.com");
    daemon.seed("def", "mx.example.com");
    daemon.seed("ghi", "alt.example.net");

    let worker_a = daemon.connect().await;
    let worker_b = daemon.connect().await;

    let first = worker_a.next_delivery("default").await.unwrap().unwrap();
    assert_eq!(first.id, "abc");

    // mx.example.com is saturated, but the other destination still flows.
    let second = worker_b.next_delivery("default").await.unwrap().unwrap();
    assert_eq!(second.id, "ghi");
}

#[tokio::test]
async fn a_disconnected_workers_reservations_are_purged() {
    let daemon = TestDaemon::start_with_limit(1).await;
    daemon.seed("abc", "mx.example.com");
    daemon.seed("def", "mx.example.com");

    let worker_a = daemon.connect().await;
    let claimed = worker_a.next_delivery("default").await.unwrap().unwrap();
    assert_eq!(claimed.id, "abc");
    assert_eq!(daemon.reservations("mx.example.com"), 1);

    // Worker A dies without releasing; its connection closes.
    drop(worker_a);
    daemon.wait_for_reservations("mx.example.com", 0).await;

    // The slot is free again for other workers.
    let worker_b = daemon.connect().await;
    let next = worker_b.next_delivery("default").await.unwrap().unwrap();
    assert_eq!(next.id, "def");
}
