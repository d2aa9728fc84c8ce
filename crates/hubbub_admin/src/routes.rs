//! Admin route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    create_topic, delete_topic, get_clients, get_health, get_stats, get_topic, get_topic_stats,
    list_topics, publish_message, AppState,
};

/// Create the admin router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/topics", post(create_topic).get(list_topics))
        .route("/topics/{name}", get(get_topic).delete(delete_topic))
        .route("/publish", post(publish_message))
        .route("/health", get(get_health))
        .route("/stats", get(get_stats))
        .route("/stats/{topic}", get(get_topic_stats))
        .route("/clients", get(get_clients))
        .with_state(state)
}
