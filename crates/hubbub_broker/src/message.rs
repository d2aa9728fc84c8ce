//! Wire and snapshot models for the broker
//!
//! `Message` is the envelope clients publish: an opaque, client-assigned id
//! and an arbitrary JSON payload. Messages are immutable once published;
//! the id is not deduplicated, only required to be non-empty.
//!
//! `ServerFrame` is every frame the server can push to a client. Frames are
//! serde-tagged on `type` and always carry a server timestamp in RFC 3339.
//!
//! The remaining types are read-only snapshots used by the observation
//! surface, plus the `SessionDirectory` seam through which the admin
//! surface sees live transport sessions without depending on the transport
//! crate.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

/// Server timestamp in RFC 3339, UTC, second precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A message published to a topic.
///
/// Both fields default when absent so that validation can report a precise
/// error (`message id is required`) instead of a generic parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Error details carried inside error frames and admin error bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Server → client frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        topic: String,
        status: String,
        ts: String,
    },
    Event {
        topic: String,
        message: Message,
        ts: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        error: ErrorBody,
        ts: String,
    },
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        ts: String,
    },
    Info {
        #[serde(skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
        msg: String,
        ts: String,
    },
}

impl ServerFrame {
    pub fn ack(topic: &str, request_id: Option<String>) -> Self {
        ServerFrame::Ack {
            request_id,
            topic: topic.to_string(),
            status: "ok".to_string(),
            ts: timestamp(),
        }
    }

    pub fn event(topic: &str, message: Message) -> Self {
        ServerFrame::Event {
            topic: topic.to_string(),
            message,
            ts: timestamp(),
        }
    }

    pub fn error(err: &BrokerError, request_id: Option<String>) -> Self {
        ServerFrame::Error {
            request_id,
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
            },
            ts: timestamp(),
        }
    }

    pub fn pong(request_id: Option<String>) -> Self {
        ServerFrame::Pong {
            request_id,
            ts: timestamp(),
        }
    }

    pub fn info(msg: &str, topic: Option<String>) -> Self {
        ServerFrame::Info {
            topic,
            msg: msg.to_string(),
            ts: timestamp(),
        }
    }
}

/// Basic topic information: name and current subscriber count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicInfo {
    pub name: String,
    pub subscribers: usize,
}

/// A list of topics, as returned by the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicList {
    pub topics: Vec<TopicInfo>,
}

/// Per-topic statistics. `messages` is the lifetime publication count, not
/// the number of messages resident in the ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicStats {
    pub name: String,
    pub messages: u64,
    pub subscribers: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

/// System health snapshot.
///
/// `subscribers` counts subscriptions (the sum of every subscriber's
/// topic-set size), not distinct subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub uptime_sec: u64,
    pub topics: usize,
    pub subscribers: usize,
}

/// System statistics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub total_topics: usize,
    pub total_messages: u64,
    pub total_subscribers: usize,
    pub active_connections: usize,
    pub uptime_seconds: u64,
    pub topics: HashMap<String, TopicStats>,
    pub generated_at: String,
}

/// Information about a live transport session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub remote_addr: String,
    pub topics: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

/// A list of live transport sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<SessionInfo>,
    pub total: usize,
}

/// Source of live session information for operator introspection.
///
/// Implemented by the transport's session index; consumed by the admin
/// surface so it never depends on the transport crate directly.
pub trait SessionDirectory: Send + Sync {
    fn active_sessions(&self) -> Vec<SessionInfo>;
}
