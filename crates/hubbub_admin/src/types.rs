//! Request and response bodies specific to the admin surface.
//!
//! Observation snapshots (`TopicList`, `Health`, `Stats`, …) come from
//! `hubbub_broker` and are serialized as-is.

use hubbub_broker::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub topic: String,
    pub message: Option<Message>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TopicResponse {
    pub status: String,
    pub topic: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub status: String,
    pub topic: String,
}
