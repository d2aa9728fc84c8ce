//! Subscriber state
//!
//! A `Subscriber` is an identified recipient with a bounded outbound queue
//! of server frames and the set of topic names it is attached to. The queue
//! supports non-blocking offers only; the slow-consumer policy on offer
//! failure lives in the fan-out path, not here.
//!
//! Lifecycle: `close` drops the queue's send side. Offers after close are
//! no-ops reported as `OfferError::Closed`, and whoever holds the receive
//! side observes end-of-stream once in-flight frames are drained.

use std::collections::HashSet;
use std::sync::{Mutex, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

use crate::message::ServerFrame;

/// Fixed capacity of every subscriber's outbound queue.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// Why a non-blocking offer did not enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferError {
    /// The queue is at capacity; the slow-consumer policy applies.
    Full,
    /// The subscriber has been torn down; the frame is silently dropped.
    Closed,
}

#[derive(Debug)]
pub struct Subscriber {
    id: String,
    topics: RwLock<HashSet<String>>,
    outbound: RwLock<Option<Sender<ServerFrame>>>,
    inbox: Mutex<Option<Receiver<ServerFrame>>>,
}

impl Subscriber {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_queue_capacity(id, OUTBOUND_QUEUE_CAPACITY)
    }

    pub(crate) fn with_queue_capacity(id: impl Into<String>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            id: id.into(),
            topics: RwLock::new(HashSet::new()),
            outbound: RwLock::new(Some(tx)),
            inbox: Mutex::new(Some(rx)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Non-blocking offer of a frame to the outbound queue.
    pub fn offer(&self, frame: ServerFrame) -> Result<(), OfferError> {
        match self.outbound.read().unwrap().as_ref() {
            Some(tx) => tx.try_send(frame).map_err(|e| match e {
                TrySendError::Full(_) => OfferError::Full,
                TrySendError::Closed(_) => OfferError::Closed,
            }),
            None => Err(OfferError::Closed),
        }
    }

    /// Close the outbound queue. Subsequent offers fail with
    /// `OfferError::Closed`; the drain side sees end-of-stream after the
    /// remaining frames.
    pub fn close(&self) {
        self.outbound.write().unwrap().take();
    }

    pub fn is_active(&self) -> bool {
        self.outbound.read().unwrap().is_some()
    }

    /// Hand the queue's receive side to the forwarder that will drain it.
    /// There is exactly one receiver; the first taker wins.
    pub fn take_receiver(&self) -> Option<Receiver<ServerFrame>> {
        self.inbox.lock().unwrap().take()
    }

    pub fn add_topic(&self, name: &str) {
        self.topics.write().unwrap().insert(name.to_string());
    }

    pub fn remove_topic(&self, name: &str) {
        self.topics.write().unwrap().remove(name);
    }

    pub fn contains_topic(&self, name: &str) -> bool {
        self.topics.read().unwrap().contains(name)
    }

    /// Snapshot of the membership set.
    pub fn topics(&self) -> Vec<String> {
        self.topics.read().unwrap().iter().cloned().collect()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ServerFrame;

    fn frame(n: u32) -> ServerFrame {
        ServerFrame::info(&format!("frame-{n}"), None)
    }

    #[test]
    fn offer_fills_up_to_capacity_then_reports_full() {
        let sub = Subscriber::with_queue_capacity("s1", 2);
        assert_eq!(sub.offer(frame(1)), Ok(()));
        assert_eq!(sub.offer(frame(2)), Ok(()));
        assert_eq!(sub.offer(frame(3)), Err(OfferError::Full));
    }

    #[test]
    fn offer_after_close_is_a_noop() {
        let sub = Subscriber::with_queue_capacity("s1", 2);
        sub.close();
        assert!(!sub.is_active());
        assert_eq!(sub.offer(frame(1)), Err(OfferError::Closed));
    }

    #[tokio::test]
    async fn drain_observes_end_of_stream_after_close() {
        let sub = Subscriber::with_queue_capacity("s1", 2);
        let mut rx = sub.take_receiver().expect("receiver available");
        sub.offer(frame(1)).expect("offer");
        sub.close();

        // The pending frame is still delivered, then the stream ends.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn receiver_can_only_be_taken_once() {
        let sub = Subscriber::new("s1");
        assert!(sub.take_receiver().is_some());
        assert!(sub.take_receiver().is_none());
    }

    #[test]
    fn topic_membership_tracks_adds_and_removes() {
        let sub = Subscriber::new("s1");
        sub.add_topic("orders");
        sub.add_topic("news");
        sub.add_topic("orders"); // idempotent
        assert_eq!(sub.topic_count(), 2);
        assert!(sub.contains_topic("orders"));

        sub.remove_topic("orders");
        sub.remove_topic("orders"); // tolerated
        assert!(!sub.contains_topic("orders"));
        assert_eq!(sub.topic_count(), 1);
    }
}
