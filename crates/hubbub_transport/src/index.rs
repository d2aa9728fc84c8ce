//! Session index
//!
//! A registry of live sessions for operator introspection. The lock is
//! taken only on connect/disconnect and on subscription changes, never on
//! the publish path.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use hubbub_broker::{SessionDirectory, SessionInfo};

#[derive(Debug)]
struct SessionEntry {
    remote_addr: String,
    topics: HashSet<String>,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SessionIndex {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: &str, remote_addr: String) {
        self.sessions.write().unwrap().insert(
            session_id.to_string(),
            SessionEntry {
                remote_addr,
                topics: HashSet::new(),
                connected_at: Utc::now(),
            },
        );
    }

    pub fn remove(&self, session_id: &str) {
        self.sessions.write().unwrap().remove(session_id);
    }

    pub fn add_topic(&self, session_id: &str, topic: &str) {
        if let Some(entry) = self.sessions.write().unwrap().get_mut(session_id) {
            entry.topics.insert(topic.to_string());
        }
    }

    pub fn drop_topic(&self, session_id: &str, topic: &str) {
        if let Some(entry) = self.sessions.write().unwrap().get_mut(session_id) {
            entry.topics.remove(topic);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().unwrap().is_empty()
    }
}

impl SessionDirectory for SessionIndex {
    fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .read()
            .unwrap()
            .iter()
            .map(|(id, entry)| SessionInfo {
                id: id.clone(),
                remote_addr: entry.remote_addr.clone(),
                topics: entry.topics.iter().cloned().collect(),
                connected_at: entry.connected_at,
            })
            .collect()
    }
}
