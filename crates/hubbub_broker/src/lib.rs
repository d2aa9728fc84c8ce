//! hubbub_broker
//!
//! The broker crate contains the in-memory publish/subscribe kernel:
//! the registry of topics and subscribers, per-topic message rings with
//! replay, bounded per-subscriber queues with slow-consumer handling, and
//! the fan-out path.
//!
//! Public types:
//! - `Broker`: the kernel — create/delete topics, publish, subscribe,
//!   unsubscribe, remove subscribers, observation snapshots.
//! - `ServerFrame` / `Message`: the server→client wire model.
//! - `BrokerError`: the error taxonomy shared by both surfaces.
//!
//! This crate is intended to be used by transport crates (WebSocket
//! streaming, HTTP admin) or binary crates that wire together network and
//! configuration. Kernel operations never block on I/O; all queue offers
//! are non-blocking.

pub mod engine;
pub mod error;
pub mod message;
pub mod subscriber;
pub mod topic;

pub use engine::Broker;
pub use error::BrokerError;
pub use message::{
    ErrorBody, Health, Message, ServerFrame, SessionDirectory, SessionInfo, SessionList, Stats,
    TopicInfo, TopicList, TopicStats,
};
pub use subscriber::{OfferError, Subscriber};
