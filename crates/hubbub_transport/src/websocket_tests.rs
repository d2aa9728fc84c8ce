use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use hubbub_broker::Broker;
use hubbub_config::Settings;

use crate::index::SessionIndex;
use crate::websocket::serve;

struct TestServer {
    url: String,
    broker: Arc<Broker>,
    index: Arc<SessionIndex>,
    shutdown: CancellationToken,
}

async fn start_server() -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let broker = Arc::new(Broker::new(100));
    let index = Arc::new(SessionIndex::new());
    let shutdown = CancellationToken::new();

    tokio::spawn(serve(
        listener,
        Arc::clone(&broker),
        Arc::clone(&index),
        Settings::default(),
        shutdown.clone(),
    ));

    TestServer {
        url: format!("ws://{addr}"),
        broker,
        index,
        shutdown,
    }
}

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("frame within deadline")
            .expect("stream open")
            .expect("read ok");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(&text).expect("valid json");
        }
    }
}

async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(WsMessage::text(value.to_string()))
        .await
        .expect("send");
}

#[tokio::test]
async fn connect_receives_welcome_info() {
    let server = start_server().await;
    let (mut ws, _) = connect_async(&server.url).await.expect("connect");

    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "info");
    assert_eq!(welcome["msg"], "connected");

    server.shutdown.cancel();
}

#[tokio::test]
async fn end_to_end_subscribe_publish() {
    let server = start_server().await;
    server.broker.create_topic("orders").expect("create");

    let (mut subscriber, _) = connect_async(&server.url).await.expect("connect subscriber");
    let (mut publisher, _) = connect_async(&server.url).await.expect("connect publisher");
    let _ = next_json(&mut subscriber).await; // welcome
    let _ = next_json(&mut publisher).await; // welcome

    send_json(
        &mut subscriber,
        json!({"type": "subscribe", "topic": "orders", "request_id": "s1"}),
    )
    .await;
    let ack = next_json(&mut subscriber).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["request_id"], "s1");
    assert_eq!(ack["status"], "ok");

    send_json(
        &mut publisher,
        json!({
            "type": "publish",
            "topic": "orders",
            "message": {"id": "m1", "payload": {"o": 1}},
            "request_id": "p1"
        }),
    )
    .await;
    let ack = next_json(&mut publisher).await;
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["request_id"], "p1");

    let event = next_json(&mut subscriber).await;
    assert_eq!(event["type"], "event");
    assert_eq!(event["topic"], "orders");
    assert_eq!(event["message"]["id"], "m1");
    assert_eq!(event["message"]["payload"], json!({"o": 1}));
    assert!(event["ts"].is_string());

    server.shutdown.cancel();
}

#[tokio::test]
async fn subscribe_to_unknown_topic_is_an_error() {
    let server = start_server().await;
    let (mut ws, _) = connect_async(&server.url).await.expect("connect");
    let _ = next_json(&mut ws).await; // welcome

    send_json(
        &mut ws,
        json!({"type": "subscribe", "topic": "nope", "request_id": "s1"}),
    )
    .await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["error"]["code"], "TOPIC_NOT_FOUND");
    assert_eq!(reply["request_id"], "s1");

    server.shutdown.cancel();
}

#[tokio::test]
async fn ping_pong_round_trip() {
    let server = start_server().await;
    let (mut ws, _) = connect_async(&server.url).await.expect("connect");
    let _ = next_json(&mut ws).await; // welcome

    send_json(&mut ws, json!({"type": "ping", "request_id": "hb1"})).await;
    let pong = next_json(&mut ws).await;
    assert_eq!(pong["type"], "pong");
    assert_eq!(pong["request_id"], "hb1");

    server.shutdown.cancel();
}

#[tokio::test]
async fn disconnect_cleans_up_subscriber_and_index() {
    let server = start_server().await;
    server.broker.create_topic("orders").expect("create");

    let (mut ws, _) = connect_async(&server.url).await.expect("connect");
    let _ = next_json(&mut ws).await; // welcome
    send_json(&mut ws, json!({"type": "subscribe", "topic": "orders"})).await;
    let _ = next_json(&mut ws).await; // ack
    assert_eq!(server.index.len(), 1);
    assert_eq!(server.broker.topic_stats("orders").unwrap().subscribers, 1);

    ws.close(None).await.expect("close");

    // The server notices the close and tears the session down.
    for _ in 0..100 {
        if server.index.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(server.index.is_empty());
    assert_eq!(server.broker.topic_stats("orders").unwrap().subscribers, 0);

    server.shutdown.cancel();
}

#[tokio::test]
async fn shutdown_closes_active_sessions() {
    let server = start_server().await;
    let (mut ws, _) = connect_async(&server.url).await.expect("connect");
    let _ = next_json(&mut ws).await; // welcome

    server.shutdown.cancel();

    // The session transitions to Closing and the peer observes the stream
    // ending (close frame or EOF).
    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(outcome.is_ok(), "session closed after shutdown");
}
