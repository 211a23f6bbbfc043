//! Delivery claim/release/defer specs over the wire

use crate::prelude::*;
use mx_client::ClientError;

#[tokio::test]
async fn get_before_the_backend_is_attached_is_rejected() {
    let daemon = TestDaemon::start_unattached().await;
    let client = daemon.connect().await;

    let err = client.next_delivery("default").await;
    match err {
        Err(ClientError::Rejected(message)) => {
            assert_eq!(message, "Service not yet started");
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    // Attaching the backend turns the same request into a clean empty result.
    daemon.service.attach_queue(daemon.queue.clone());
    let delivery = client.next_delivery("default").await.unwrap();
    assert!(delivery.is_none());
}

#[tokio::test]
async fn get_against_an_unknown_zone_is_rejected() {
    let daemon = TestDaemon::start().await;
    let client = daemon.connect().await;

    let err = client.next_delivery("bounces").await;
    match err {
        Err(ClientError::Rejected(message)) => {
            assert_eq!(message, "Selected Sending Zone does not exist");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn get_on_an_empty_zone_returns_no_job() {
    let daemon = TestDaemon::start().await;
    let client = daemon.connect().await;

    let delivery = client.next_delivery("default").await.unwrap();
    assert!(delivery.is_none());
}

#[tokio::test]
async fn get_hands_out_an_enriched_claim() {
    let daemon = TestDaemon::start().await;
    daemon.seed("abc", "mx.example.com");

    let client = daemon.connect().await;
    let delivery = client.next_delivery("default").await.unwrap().unwrap();

    assert_eq!(delivery.id, "abc");
    assert_eq!(delivery.seq, "1");
    assert!(delivery.lock_token.is_some());
    assert_eq!(delivery.sender.as_deref(), Some("sender@example.com"));
    assert_eq!(daemon.reservations("mx.example.com"), 1);
}

#[tokio::test]
async fn release_confirms_and_frees_the_reservation() {
    let daemon = TestDaemon::start().await;
    daemon.seed("abc", "mx.example.com");

    let client = daemon.connect().await;
    let delivery = client.next_delivery("default").await.unwrap().unwrap();

    let done = client
        .release("default", &delivery.id, &delivery.seq, delivery.lock_token)
        .await
        .unwrap();

    assert_eq!(done, "abc.1");
    assert_eq!(daemon.reservations("mx.example.com"), 0);
}

#[tokio::test]
async fn release_of_an_unknown_job_is_rejected() {
    let daemon = TestDaemon::start().await;
    let client = daemon.connect().await;

    let err = client.release("default", "abc", "1", None).await;
    match err {
        Err(ClientError::Rejected(message)) => {
            assert_eq!(message, "Delivery not found");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn defer_confirms_and_hides_the_job_until_due() {
    let daemon = TestDaemon::start().await;
    daemon.seed("abc", "mx.example.com");

    let client = daemon.connect().await;
    let delivery = client.next_delivery("default").await.unwrap().unwrap();

    let done = client
        .defer(
            "default",
            &delivery.id,
            &delivery.seq,
            delivery.lock_token,
            300,
        )
        .await
        .unwrap();

    assert_eq!(done, "abc.1");
    assert_eq!(daemon.reservations("mx.example.com"), 0);

    // Deferred for 300s: nothing eligible right now
    let retry = client.next_delivery("default").await.unwrap();
    assert!(retry.is_none());
}
