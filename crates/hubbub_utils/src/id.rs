//! Identifier generation
//!
//! Subscriber ids must be unique process-wide; correlation ids only need to
//! be unique enough to match a reply to its request. Both are random UUIDs,
//! correlation ids in the compact form.

use uuid::Uuid;

/// Generate a unique subscriber/session identifier.
pub fn subscriber_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a correlation id for request/reply matching.
pub fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}
