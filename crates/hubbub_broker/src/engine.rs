//! Broker engine
//!
//! The kernel holding the topic and subscriber registries and the fan-out
//! path. One registry-level `RwLock` guards both top-level maps; each topic
//! and subscriber carries its own lock. Lock order is strictly
//! registry → topic → subscriber. Publish and subscribe drop the registry
//! lock before taking per-entity write locks; the `Arc` handles stay valid
//! until the registry commits a removal.
//!
//! Kernel operations never block on I/O. Queue offers are non-blocking;
//! a subscriber whose queue cannot even take the slow-consumer warning is
//! torn down on a background task, because teardown needs the registry
//! write lock and must not run on the publishing task.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::BrokerError;
use crate::message::{self, Health, Message, ServerFrame, Stats, TopicInfo, TopicStats};
use crate::subscriber::{OfferError, Subscriber};
use crate::topic::Topic;

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<String, Arc<Topic>>,
    subscribers: HashMap<String, Arc<Subscriber>>,
}

#[derive(Debug)]
pub struct Broker {
    /// Shared with background teardown tasks, which outlive the publishing
    /// call that scheduled them.
    registry: Arc<RwLock<Registry>>,
    max_messages_per_topic: usize,
    started_at: Instant,
}

impl Broker {
    /// Create a broker whose topics retain up to `max_messages_per_topic`
    /// recent messages for replay.
    pub fn new(max_messages_per_topic: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            max_messages_per_topic,
            started_at: Instant::now(),
        }
    }

    pub fn create_topic(&self, name: &str) -> Result<(), BrokerError> {
        if name.is_empty() {
            return Err(BrokerError::BadRequest("topic name is required".into()));
        }

        let mut registry = self.registry.write().unwrap();
        if registry.topics.contains_key(name) {
            return Err(BrokerError::TopicExists);
        }
        registry
            .topics
            .insert(name.to_string(), Arc::new(Topic::new(name, self.max_messages_per_topic)));

        info!(topic = %name, "topic created");
        Ok(())
    }

    /// Delete a topic, notifying each attached subscriber best-effort with a
    /// `topic_deleted` info frame before detaching it.
    pub fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        let mut registry = self.registry.write().unwrap();
        let topic = registry
            .topics
            .remove(name)
            .ok_or(BrokerError::TopicNotFound)?;

        let notice = ServerFrame::info("topic_deleted", Some(name.to_string()));
        let members = topic.members();
        for subscriber in &members {
            // Full queues simply miss the notice; the detach still happens.
            let _ = subscriber.offer(notice.clone());
            subscriber.remove_topic(name);
        }

        // Defensive sweep: the name must not linger in any membership set,
        // attached or not.
        for subscriber in registry.subscribers.values() {
            subscriber.remove_topic(name);
        }

        info!(topic = %name, subscribers_affected = members.len(), "topic deleted");
        Ok(())
    }

    /// Publish a message: append to the topic ring and fan the event out to
    /// every subscriber attached at commit time.
    ///
    /// The publisher gets `Ok` regardless of per-subscriber delivery
    /// outcomes; slow consumers are warned on their own queue and torn down
    /// asynchronously if even the warning does not fit.
    pub fn publish(&self, topic_name: &str, message: Message) -> Result<(), BrokerError> {
        if topic_name.is_empty() {
            return Err(BrokerError::BadRequest("topic is required".into()));
        }
        if message.id.is_empty() {
            return Err(BrokerError::BadRequest("message id is required".into()));
        }

        let topic = self
            .lookup_topic(topic_name)
            .ok_or(BrokerError::TopicNotFound)?;

        let message_id = message.id.clone();
        let subscribers = topic.commit(message.clone());
        let frame = ServerFrame::event(topic_name, message);

        let subscriber_count = subscribers.len();
        for subscriber in subscribers {
            self.fan_out(topic_name, &subscriber, frame.clone());
        }

        info!(
            topic = %topic_name,
            message_id = %message_id,
            subscribers = subscriber_count,
            "message published"
        );
        Ok(())
    }

    /// Deliver one event frame to one subscriber, applying the
    /// slow-consumer policy on overflow.
    fn fan_out(&self, topic_name: &str, subscriber: &Arc<Subscriber>, frame: ServerFrame) {
        match subscriber.offer(frame) {
            Ok(()) => {}
            // Racing teardown captured this handle before removal; the
            // closed queue swallows the frame.
            Err(OfferError::Closed) => {}
            Err(OfferError::Full) => {
                let warning = ServerFrame::error(&BrokerError::SlowConsumer, None);
                match subscriber.offer(warning) {
                    Ok(()) | Err(OfferError::Closed) => {}
                    Err(OfferError::Full) => {
                        warn!(
                            subscriber_id = %subscriber.id(),
                            topic = %topic_name,
                            "subscriber queue overflow, disconnecting"
                        );
                        // Teardown needs the registry write lock; it must
                        // not run on the publishing task.
                        let registry = Arc::clone(&self.registry);
                        let subscriber_id = subscriber.id().to_string();
                        tokio::spawn(async move {
                            Self::teardown_subscriber(&registry, &subscriber_id);
                        });
                    }
                }
            }
        }
    }

    /// Attach `subscriber_id` to a topic, creating the subscriber on first
    /// use. With `last_n > 0`, up to `last_n` ring messages are replayed
    /// newest-first; replay aborts silently on the first failed offer.
    pub fn subscribe(
        &self,
        subscriber_id: &str,
        topic_name: &str,
        last_n: usize,
    ) -> Result<(), BrokerError> {
        if subscriber_id.is_empty() {
            return Err(BrokerError::BadRequest("subscriber id is required".into()));
        }
        let topic = self
            .lookup_topic(topic_name)
            .ok_or(BrokerError::TopicNotFound)?;

        let subscriber = {
            let mut registry = self.registry.write().unwrap();
            Arc::clone(
                registry
                    .subscribers
                    .entry(subscriber_id.to_string())
                    .or_insert_with(|| Arc::new(Subscriber::new(subscriber_id))),
            )
        };

        subscriber.add_topic(topic_name);
        topic.attach(Arc::clone(&subscriber));

        if last_n > 0 {
            self.replay(&topic, &subscriber, last_n);
        }

        info!(
            subscriber_id = %subscriber_id,
            topic = %topic_name,
            historical_messages = last_n,
            total_subscribers = topic.subscriber_count(),
            "subscribed"
        );
        Ok(())
    }

    /// Replay the last `n` ring messages to a fresh subscription, newest
    /// first. The slow-consumer policy does not apply here: the client has
    /// not yet observed a steady-state stream, so a full queue just ends the
    /// replay.
    fn replay(&self, topic: &Topic, subscriber: &Subscriber, n: usize) {
        let window = topic.recent(n);
        let total = window.len();
        for (sent, message) in window.into_iter().rev().enumerate() {
            if subscriber.offer(ServerFrame::event(topic.name(), message)).is_err() {
                debug!(
                    subscriber_id = %subscriber.id(),
                    topic = %topic.name(),
                    messages_sent = sent,
                    messages_requested = total,
                    "replay stopped, queue full"
                );
                return;
            }
        }
    }

    /// Detach a subscriber from a topic. Both the topic-side and the
    /// subscriber-side removals tolerate absence.
    pub fn unsubscribe(&self, subscriber_id: &str, topic_name: &str) -> Result<(), BrokerError> {
        let topic = self
            .lookup_topic(topic_name)
            .ok_or(BrokerError::TopicNotFound)?;

        topic.detach(subscriber_id);

        let subscriber = {
            let registry = self.registry.read().unwrap();
            registry.subscribers.get(subscriber_id).cloned()
        };
        if let Some(subscriber) = subscriber {
            subscriber.remove_topic(topic_name);
        }

        info!(
            subscriber_id = %subscriber_id,
            topic = %topic_name,
            remaining_subscribers = topic.subscriber_count(),
            "unsubscribed"
        );
        Ok(())
    }

    /// Tear a subscriber down: detach it from every topic, close its queue,
    /// and drop it from the registry. Removing an unknown id is a no-op.
    ///
    /// Safe to run concurrently with publish: a fan-out that captured the
    /// handle before removal offers to a closed queue, which is a no-op.
    pub fn remove_subscriber(&self, subscriber_id: &str) {
        Self::teardown_subscriber(&self.registry, subscriber_id);
    }

    fn teardown_subscriber(registry: &RwLock<Registry>, subscriber_id: &str) {
        let mut registry = registry.write().unwrap();
        let Some(subscriber) = registry.subscribers.remove(subscriber_id) else {
            return;
        };

        let topics = subscriber.topics();
        for topic_name in &topics {
            if let Some(topic) = registry.topics.get(topic_name) {
                topic.detach(subscriber_id);
            }
        }
        subscriber.close();

        info!(
            subscriber_id = %subscriber_id,
            topics_subscribed = topics.len(),
            remaining_subscribers = registry.subscribers.len(),
            "subscriber removed"
        );
    }

    /// Handle to a live subscriber, used by the transport to bind the drain
    /// side of its queue.
    pub fn subscriber(&self, subscriber_id: &str) -> Option<Arc<Subscriber>> {
        self.registry
            .read()
            .unwrap()
            .subscribers
            .get(subscriber_id)
            .cloned()
    }

    fn lookup_topic(&self, name: &str) -> Option<Arc<Topic>> {
        self.registry.read().unwrap().topics.get(name).cloned()
    }

    /// Snapshot of all topics with their subscriber counts.
    pub fn topics(&self) -> Vec<TopicInfo> {
        let registry = self.registry.read().unwrap();
        registry.topics.values().map(|t| t.info()).collect()
    }

    /// Per-topic statistics.
    pub fn topic_stats(&self, name: &str) -> Result<TopicStats, BrokerError> {
        self.lookup_topic(name)
            .map(|t| t.stats())
            .ok_or(BrokerError::TopicNotFound)
    }

    /// System health. `subscribers` is the total number of subscriptions
    /// (each subscriber counted once per attached topic).
    pub fn health(&self) -> Health {
        let registry = self.registry.read().unwrap();
        Health {
            uptime_sec: self.started_at.elapsed().as_secs(),
            topics: registry.topics.len(),
            subscribers: registry
                .subscribers
                .values()
                .map(|s| s.topic_count())
                .sum(),
        }
    }

    /// System statistics. `active_connections` is zero here; the admin
    /// surface fills it in from the session directory.
    pub fn stats(&self) -> Stats {
        let registry = self.registry.read().unwrap();
        let topics: HashMap<String, TopicStats> = registry
            .topics
            .iter()
            .map(|(name, topic)| (name.clone(), topic.stats()))
            .collect();

        Stats {
            total_topics: topics.len(),
            total_messages: topics.values().map(|t| t.messages).sum(),
            total_subscribers: registry.subscribers.len(),
            active_connections: 0,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            topics,
            generated_at: message::timestamp(),
        }
    }
}
