use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;

use hubbub_broker::{Broker, SessionDirectory, SessionInfo};

use crate::handlers::AppState;
use crate::routes::router;

/// Stand-in for the transport's session index.
struct StubDirectory(Vec<SessionInfo>);

impl SessionDirectory for StubDirectory {
    fn active_sessions(&self) -> Vec<SessionInfo> {
        self.0.clone()
    }
}

fn test_app() -> (axum::Router, Arc<Broker>) {
    test_app_with_sessions(Vec::new())
}

fn test_app_with_sessions(sessions: Vec<SessionInfo>) -> (axum::Router, Arc<Broker>) {
    let broker = Arc::new(Broker::new(100));
    let state = AppState {
        broker: Arc::clone(&broker),
        sessions: Arc::new(StubDirectory(sessions)),
    };
    (router(state), broker)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn create_topic_returns_created() {
    let (app, broker) = test_app();

    let response = app
        .oneshot(post_json("/topics", json!({"name": "orders"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "created");
    assert_eq!(body["topic"], "orders");
    assert_eq!(broker.topics().len(), 1);
}

#[tokio::test]
async fn duplicate_topic_conflicts() {
    let (app, broker) = test_app();
    broker.create_topic("orders").expect("create");

    let response = app
        .oneshot(post_json("/topics", json!({"name": "orders"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "TOPIC_EXISTS");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn create_topic_requires_name() {
    let (app, _broker) = test_app();

    let response = app
        .oneshot(post_json("/topics", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn delete_topic_round_trip() {
    let (app, broker) = test_app();
    broker.create_topic("orders").expect("create");

    let response = app
        .clone()
        .oneshot(delete("/topics/orders"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "deleted");

    let response = app.oneshot(delete("/topics/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_topics_reports_subscriber_counts() {
    let (app, broker) = test_app();
    broker.create_topic("orders").expect("create");
    broker.subscribe("s1", "orders", 0).expect("subscribe");

    let response = app.oneshot(get("/topics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let topics = body["topics"].as_array().expect("topics array");
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["name"], "orders");
    assert_eq!(topics[0]["subscribers"], 1);
}

#[tokio::test]
async fn get_topic_returns_details_or_not_found() {
    let (app, broker) = test_app();
    broker.create_topic("orders").expect("create");
    broker
        .publish("orders", hubbub_broker::Message { id: "m1".into(), payload: json!(1) })
        .expect("publish");

    let response = app.clone().oneshot(get("/topics/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "orders");
    assert_eq!(body["messages"], 1);
    assert_eq!(body["subscribers"], 0);

    let response = app.oneshot(get("/topics/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publish_happy_path_and_failures() {
    let (app, broker) = test_app();
    broker.create_topic("orders").expect("create");

    let response = app
        .clone()
        .oneshot(post_json(
            "/publish",
            json!({"topic": "orders", "message": {"id": "m1", "payload": {"o": 1}}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "published");
    assert_eq!(broker.topic_stats("orders").unwrap().messages, 1);

    // Unknown topic.
    let response = app
        .clone()
        .oneshot(post_json(
            "/publish",
            json!({"topic": "missing", "message": {"id": "m1", "payload": 1}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Missing message.
    let response = app
        .clone()
        .oneshot(post_json("/publish", json!({"topic": "orders"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing message id.
    let response = app
        .oneshot(post_json(
            "/publish",
            json!({"topic": "orders", "message": {"payload": 1}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_uptime_topics_and_subscriptions() {
    let (app, broker) = test_app();
    broker.create_topic("a").expect("create");
    broker.create_topic("b").expect("create");
    broker.subscribe("s1", "a", 0).expect("subscribe");
    broker.subscribe("s1", "b", 0).expect("subscribe");

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["topics"], 2);
    assert_eq!(body["subscribers"], 2);
    assert!(body["uptime_sec"].is_u64());
}

#[tokio::test]
async fn stats_include_topics_and_live_connections() {
    let session = SessionInfo {
        id: "sess-1".to_string(),
        remote_addr: "127.0.0.1:9".to_string(),
        topics: vec!["orders".to_string()],
        connected_at: Utc::now(),
    };
    let (app, broker) = test_app_with_sessions(vec![session]);
    broker.create_topic("orders").expect("create");
    broker
        .publish("orders", hubbub_broker::Message { id: "m1".into(), payload: json!(1) })
        .expect("publish");

    let response = app.oneshot(get("/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total_topics"], 1);
    assert_eq!(body["total_messages"], 1);
    assert_eq!(body["active_connections"], 1);
    assert_eq!(body["topics"]["orders"]["messages"], 1);
    assert!(body["generated_at"].is_string());
}

#[tokio::test]
async fn per_topic_stats_route() {
    let (app, broker) = test_app();
    broker.create_topic("orders").expect("create");

    let response = app.clone().oneshot(get("/stats/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "orders");

    let response = app.oneshot(get("/stats/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clients_lists_active_sessions() {
    let session = SessionInfo {
        id: "sess-1".to_string(),
        remote_addr: "127.0.0.1:9".to_string(),
        topics: vec![],
        connected_at: Utc::now(),
    };
    let (app, _broker) = test_app_with_sessions(vec![session]);

    let response = app.oneshot(get("/clients")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["sessions"][0]["id"], "sess-1");
}
