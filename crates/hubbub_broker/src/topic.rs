//! Topic state
//!
//! A `Topic` holds a bounded FIFO ring of recent messages, the set of
//! attached subscribers, and lifetime counters. All state sits behind one
//! per-topic `RwLock`; callers must already hold no registry lock or the
//! registry lock only (lock order: registry → topic → subscriber).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::message::{Message, TopicInfo, TopicStats};
use crate::subscriber::Subscriber;

#[derive(Debug)]
pub struct Topic {
    name: String,
    capacity: usize,
    state: RwLock<TopicState>,
}

#[derive(Debug)]
struct TopicState {
    ring: VecDeque<Message>,
    subscribers: HashMap<String, Arc<Subscriber>>,
    message_count: u64,
    created_at: DateTime<Utc>,
    last_message_at: Option<DateTime<Utc>>,
}

impl Topic {
    pub fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            capacity,
            state: RwLock::new(TopicState {
                ring: VecDeque::with_capacity(capacity),
                subscribers: HashMap::new(),
                message_count: 0,
                created_at: Utc::now(),
                last_message_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a message and snapshot the current subscriber set under a
    /// single write-lock hold, so per-subscriber delivery order matches the
    /// ring's commit order.
    ///
    /// Eviction is strictly oldest-first once the ring exceeds capacity.
    pub fn commit(&self, message: Message) -> Vec<Arc<Subscriber>> {
        let mut state = self.state.write().unwrap();
        state.ring.push_back(message);
        if state.ring.len() > self.capacity {
            state.ring.pop_front();
        }
        state.message_count += 1;
        state.last_message_at = Some(Utc::now());
        state.subscribers.values().cloned().collect()
    }

    /// Up to the last `n` messages in publication order (oldest first among
    /// the selected window). The whole ring if `n` exceeds its length.
    pub fn recent(&self, n: usize) -> Vec<Message> {
        let state = self.state.read().unwrap();
        let skip = state.ring.len().saturating_sub(n);
        state.ring.iter().skip(skip).cloned().collect()
    }

    /// Attach a subscriber. Repeated attach under the same id replaces the
    /// handle (last write wins).
    pub fn attach(&self, subscriber: Arc<Subscriber>) {
        let mut state = self.state.write().unwrap();
        state
            .subscribers
            .insert(subscriber.id().to_string(), subscriber);
    }

    /// Detach a subscriber; detaching an absent id is tolerated.
    pub fn detach(&self, subscriber_id: &str) {
        self.state.write().unwrap().subscribers.remove(subscriber_id);
    }

    pub fn contains_subscriber(&self, subscriber_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .subscribers
            .contains_key(subscriber_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.read().unwrap().subscribers.len()
    }

    /// Snapshot of the attached subscriber handles.
    pub fn members(&self) -> Vec<Arc<Subscriber>> {
        self.state
            .read()
            .unwrap()
            .subscribers
            .values()
            .cloned()
            .collect()
    }

    /// Lifetime publication count; never decremented by eviction.
    pub fn message_count(&self) -> u64 {
        self.state.read().unwrap().message_count
    }

    pub fn ring_len(&self) -> usize {
        self.state.read().unwrap().ring.len()
    }

    pub fn info(&self) -> TopicInfo {
        TopicInfo {
            name: self.name.clone(),
            subscribers: self.subscriber_count(),
        }
    }

    pub fn stats(&self) -> TopicStats {
        let state = self.state.read().unwrap();
        TopicStats {
            name: self.name.clone(),
            messages: state.message_count,
            subscribers: state.subscribers.len(),
            created_at: state.created_at,
            last_message_at: state.last_message_at,
        }
    }
}
