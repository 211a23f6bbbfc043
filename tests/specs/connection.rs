//! Connection handling and request multiplexing specs

use crate::prelude::*;

use mx_daemon::protocol::{self, Response};
use serde_json::json;
use tokio::net::TcpStream;

async fn raw_send(stream: &mut TcpStream, value: serde_json::Value) {
    let frame = serde_json::to_vec(&value).unwrap();
    protocol::write_message(stream, &frame).await.unwrap();
}

async fn raw_read(stream: &mut TcpStream) -> Response {
    let frame = protocol::read_message(stream).await.unwrap();
    protocol::decode(&frame).unwrap()
}

#[tokio::test]
async fn frames_without_a_request_id_are_ignored() {
    let daemon = TestDaemon::start().await;
    let mut stream = TcpStream::connect(daemon.addr).await.unwrap();

    // No `req`: nothing to correlate a reply to, the frame is dropped.
    raw_send(&mut stream, json!({"cmd": "GET", "zone": "default"})).await;

    // The connection stays healthy; the next request is answered.
    raw_send(&mut stream, json!({"req": 1, "cmd": "GET", "zone": "default"})).await;
    let response = raw_read(&mut stream).await;

    assert_eq!(
        response,
        Response::Delivery {
            req: 1,
            delivery: None,
        }
    );
}

#[tokio::test]
async fn unknown_commands_get_an_explicit_error() {
    let daemon = TestDaemon::start().await;
    let mut stream = TcpStream::connect(daemon.addr).await.unwrap();

    raw_send(
        &mut stream,
        json!({"req": 9, "cmd": "STEAL", "zone": "default"}),
    )
    .await;

    match raw_read(&mut stream).await {
        Response::Error { req, error } => {
            assert_eq!(req, 9);
            assert!(error.contains("unknown or malformed command"));
        }
        other => panic!("expected an error, got {:?}", other),
    }
}

#[tokio::test]
async fn defer_accepts_a_numeric_string_ttl_on_the_wire() {
    let daemon = TestDaemon::start().await;
    daemon.seed("abc", "mx.example.com");

    let mut stream = TcpStream::connect(daemon.addr).await.unwrap();

    raw_send(&mut stream, json!({"req": 1, "cmd": "GET", "zone": "default"})).await;
    let claimed = match raw_read(&mut stream).await {
        Response::Delivery {
            delivery: Some(delivery),
            ..
        } => delivery,
        other => panic!("expected a delivery, got {:?}", other),
    };

    raw_send(
        &mut stream,
        json!({
            "req": 2,
            "cmd": "DEFER",
            "zone": "default",
            "id": claimed.id,
            "seq": claimed.seq,
            "lock": claimed.lock_token,
            "ttl": "300",
        }),
    )
    .await;

    assert_eq!(
        raw_read(&mut stream).await,
        Response::Done {
            req: 2,
            delivery: "abc.1".to_string(),
        }
    );

    // The string ttl reached the zone as 300 seconds: not eligible yet.
    raw_send(&mut stream, json!({"req": 3, "cmd": "GET", "zone": "default"})).await;
    assert_eq!(
        raw_read(&mut stream).await,
        Response::Delivery {
            req: 3,
            delivery: None,
        }
    );
}

#[tokio::test]
async fn concurrent_requests_on_one_connection_resolve_by_id() {
    let daemon = TestDaemon::start().await;
    daemon.seed("abc", "mx.example.com");
    daemon.seed("ghi", "alt.example.net");

    let client = daemon.connect().await;

    // Both requests are in flight on the same connection at once; each
    // caller gets the answer matching its own request id.
    let (first, second) = tokio::join!(
        client.next_delivery("default"),
        client.next_delivery("default"),
    );

    let mut ids = vec![
        first.unwrap().expect("first delivery").id,
        second.unwrap().expect("second delivery").id,
    ];
    ids.sort();
    assert_eq!(ids, vec!["abc".to_string(), "ghi".to_string()]);
}
