//! Session state machine
//!
//! One `Session` per connection. The reader task parses inbound frames and
//! dispatches them here; replies and fan-out frames go through the bounded
//! outbound queue drained by the writer task. Subscribing binds a
//! subscriber identity and starts a forwarder that moves frames from that
//! subscriber's kernel queue into the session queue.
//!
//! Each forwarder carries its own stop token (a child of the session
//! token), so an unsubscribe on one topic can never tear down the
//! forwarder serving a later subscription. Unsubscribing stops the event
//! flow by detaching in the kernel; the forwarder itself only exits on
//! session close or when the subscriber's queue closes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{error::TrySendError, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hubbub_broker::{Broker, BrokerError, Message, ServerFrame};

use crate::index::SessionIndex;
use crate::message::ClientFrame;

/// Capacity of the session's outbound queue.
pub const SESSION_QUEUE_CAPACITY: usize = 100;

pub struct Session {
    id: String,
    broker: Arc<Broker>,
    index: Arc<SessionIndex>,
    outbound: Sender<ServerFrame>,
    /// topic → subscriber id the session used for it.
    bindings: Mutex<HashMap<String, String>>,
    /// subscriber id → stop token of the forwarder draining its queue.
    forwarders: Mutex<HashMap<String, CancellationToken>>,
    stop: CancellationToken,
}

impl Session {
    pub fn new(
        broker: Arc<Broker>,
        index: Arc<SessionIndex>,
        outbound: Sender<ServerFrame>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            id: hubbub_utils::id::subscriber_id(),
            broker,
            index,
            outbound,
            bindings: Mutex::new(HashMap::new()),
            forwarders: Mutex::new(HashMap::new()),
            stop,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Parse and dispatch one inbound text frame.
    pub fn handle_text(&self, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => {
                self.reply_error(
                    &BrokerError::BadRequest("invalid message format".into()),
                    None,
                );
                return;
            }
        };

        match serde_json::from_value::<ClientFrame>(value.clone()) {
            Ok(frame) => self.dispatch(frame),
            Err(err) => {
                // The tag failed to resolve or a field had the wrong shape;
                // echo the correlation id if the object carried one.
                let request_id = value
                    .get("request_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let detail = match value.get("type").and_then(|v| v.as_str()) {
                    None => "message type is required".to_string(),
                    Some(kind) if matches!(kind, "publish" | "subscribe" | "unsubscribe" | "ping") => {
                        format!("invalid {kind} message: {err}")
                    }
                    Some(kind) => format!("unsupported message type: {kind}"),
                };
                self.reply_error(&BrokerError::BadRequest(detail), request_id);
            }
        }
    }

    pub fn dispatch(&self, frame: ClientFrame) {
        match frame {
            ClientFrame::Publish {
                topic,
                message,
                request_id,
            } => self.handle_publish(topic, message, request_id),
            ClientFrame::Subscribe {
                topic,
                client_id,
                last_n,
                request_id,
            } => self.handle_subscribe(topic, client_id, last_n, request_id),
            ClientFrame::Unsubscribe {
                topic,
                client_id,
                request_id,
            } => self.handle_unsubscribe(topic, client_id, request_id),
            ClientFrame::Ping { request_id } => self.send(ServerFrame::pong(request_id)),
        }
    }

    fn handle_publish(&self, topic: String, message: Option<Message>, request_id: Option<String>) {
        if topic.is_empty() {
            return self.reply_error(
                &BrokerError::BadRequest("topic is required".into()),
                request_id,
            );
        }
        let Some(message) = message else {
            return self.reply_error(
                &BrokerError::BadRequest("message is required".into()),
                request_id,
            );
        };
        if message.id.is_empty() {
            return self.reply_error(
                &BrokerError::BadRequest("message id is required".into()),
                request_id,
            );
        }

        match self.broker.publish(&topic, message) {
            Ok(()) => self.send(ServerFrame::ack(&topic, request_id)),
            Err(err) => self.reply_error(&err, request_id),
        }
    }

    fn handle_subscribe(
        &self,
        topic: String,
        client_id: Option<String>,
        last_n: Option<usize>,
        request_id: Option<String>,
    ) {
        if topic.is_empty() {
            return self.reply_error(
                &BrokerError::BadRequest("topic is required".into()),
                request_id,
            );
        }
        let subscriber_id = self.resolve_subscriber_id(client_id);

        match self
            .broker
            .subscribe(&subscriber_id, &topic, last_n.unwrap_or(0))
        {
            Ok(()) => {
                self.bindings
                    .lock()
                    .unwrap()
                    .insert(topic.clone(), subscriber_id.clone());
                self.index.add_topic(&self.id, &topic);
                self.start_forwarder(&subscriber_id);
                self.send(ServerFrame::ack(&topic, request_id));
            }
            Err(err) => self.reply_error(&err, request_id),
        }
    }

    fn handle_unsubscribe(
        &self,
        topic: String,
        client_id: Option<String>,
        request_id: Option<String>,
    ) {
        if topic.is_empty() {
            return self.reply_error(
                &BrokerError::BadRequest("topic is required".into()),
                request_id,
            );
        }
        let subscriber_id = self.resolve_subscriber_id(client_id);

        match self.broker.unsubscribe(&subscriber_id, &topic) {
            Ok(()) => {
                self.bindings.lock().unwrap().remove(&topic);
                self.index.drop_topic(&self.id, &topic);
                self.send(ServerFrame::ack(&topic, request_id));
            }
            Err(err) => self.reply_error(&err, request_id),
        }
    }

    /// The subscriber identity a frame operates on: the caller-supplied
    /// `client_id` when present and non-empty, otherwise the session's own
    /// generated id.
    fn resolve_subscriber_id(&self, client_id: Option<String>) -> String {
        client_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.id.clone())
    }

    /// Start draining `subscriber_id`'s kernel queue into the session
    /// queue. The queue's receive side arbitrates: only a subscriber whose
    /// receiver has not been taken gets a new forwarder, so a running
    /// forwarder is never duplicated, and a subscriber re-created under the
    /// same id after teardown gets a fresh one.
    fn start_forwarder(&self, subscriber_id: &str) {
        let Some(subscriber) = self.broker.subscriber(subscriber_id) else {
            return;
        };
        let Some(mut inbox) = subscriber.take_receiver() else {
            // A forwarder already drains this identity, here or in another
            // session.
            debug!(
                session_id = %self.id,
                subscriber_id = %subscriber_id,
                "subscriber queue already bound"
            );
            return;
        };

        let stop = self.stop.child_token();
        self.forwarders
            .lock()
            .unwrap()
            .insert(subscriber_id.to_string(), stop.clone());

        let outbound = self.outbound.clone();
        let session_id = self.id.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    frame = inbox.recv() => match frame {
                        Some(frame) => match outbound.try_send(frame) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                warn!(session_id = %session_id, "session queue full, dropping frame");
                            }
                            Err(TrySendError::Closed(_)) => break,
                        },
                        // Subscriber torn down; nothing more will arrive.
                        None => break,
                    },
                }
            }
        });
    }

    /// Offer a frame to the session's outbound queue.
    pub fn send(&self, frame: ServerFrame) {
        match self.outbound.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(session_id = %self.id, "session queue full, dropping reply");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    fn reply_error(&self, err: &BrokerError, request_id: Option<String>) {
        self.send(ServerFrame::error(err, request_id));
    }

    /// Transition to Closing: cancel every forwarder, tear down every
    /// subscriber identity this session bound, and deregister from the
    /// index. Idempotent.
    pub fn close(&self) {
        self.stop.cancel();

        let mut bound: HashSet<String> = self
            .bindings
            .lock()
            .unwrap()
            .values()
            .cloned()
            .collect();
        bound.insert(self.id.clone());
        for subscriber_id in bound {
            self.broker.remove_subscriber(&subscriber_id);
        }

        self.forwarders.lock().unwrap().clear();
        self.index.remove(&self.id);
    }
}
