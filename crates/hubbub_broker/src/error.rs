use thiserror::Error;

/// Errors surfaced by kernel operations.
///
/// Each variant maps to a wire error code. `BAD_REQUEST` reports invalid
/// input without touching broker state; `SLOW_CONSUMER` is delivered to the
/// affected subscriber, never to the publisher.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("topic not found")]
    TopicNotFound,

    #[error("topic already exists")]
    TopicExists,

    #[error("{0}")]
    BadRequest(String),

    #[error("subscriber queue overflow")]
    SlowConsumer,

    #[error("{0}")]
    Internal(String),
}

impl BrokerError {
    /// The protocol error code carried in error frames and admin responses.
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::TopicNotFound => "TOPIC_NOT_FOUND",
            BrokerError::TopicExists => "TOPIC_EXISTS",
            BrokerError::BadRequest(_) => "BAD_REQUEST",
            BrokerError::SlowConsumer => "SLOW_CONSUMER",
            BrokerError::Internal(_) => "INTERNAL",
        }
    }
}
