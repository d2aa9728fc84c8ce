//! HTTP handlers for the admin endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use hubbub_broker::{
    Broker, BrokerError, Health, SessionDirectory, SessionList, Stats, TopicList, TopicStats,
};

use crate::error::Result;
use crate::types::{CreateTopicRequest, PublishRequest, PublishResponse, TopicResponse};

/// Shared state for all admin routes.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub sessions: Arc<dyn SessionDirectory>,
}

pub async fn create_topic(
    State(state): State<AppState>,
    Json(request): Json<CreateTopicRequest>,
) -> Result<(StatusCode, Json<TopicResponse>)> {
    state.broker.create_topic(&request.name)?;

    info!(topic = %request.name, "topic created via admin");
    Ok((
        StatusCode::CREATED,
        Json(TopicResponse {
            status: "created".to_string(),
            topic: request.name,
        }),
    ))
}

pub async fn delete_topic(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TopicResponse>> {
    state.broker.delete_topic(&name)?;

    info!(topic = %name, "topic deleted via admin");
    Ok(Json(TopicResponse {
        status: "deleted".to_string(),
        topic: name,
    }))
}

pub async fn list_topics(State(state): State<AppState>) -> Json<TopicList> {
    Json(TopicList {
        topics: state.broker.topics(),
    })
}

pub async fn get_topic(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TopicStats>> {
    Ok(Json(state.broker.topic_stats(&name)?))
}

pub async fn publish_message(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<PublishResponse>> {
    let message = request
        .message
        .ok_or_else(|| BrokerError::BadRequest("message is required".into()))?;

    state.broker.publish(&request.topic, message)?;

    Ok(Json(PublishResponse {
        status: "published".to_string(),
        topic: request.topic,
    }))
}

pub async fn get_health(State(state): State<AppState>) -> Json<Health> {
    Json(state.broker.health())
}

pub async fn get_stats(State(state): State<AppState>) -> Json<Stats> {
    let mut stats = state.broker.stats();
    stats.active_connections = state.sessions.active_sessions().len();
    Json(stats)
}

pub async fn get_topic_stats(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<TopicStats>> {
    Ok(Json(state.broker.topic_stats(&topic)?))
}

pub async fn get_clients(State(state): State<AppState>) -> Json<SessionList> {
    let sessions = state.sessions.active_sessions();
    let total = sessions.len();
    Json(SessionList { sessions, total })
}
