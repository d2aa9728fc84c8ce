//! Client → server frames
//!
//! Frames are JSON objects tagged on `type`. `topic` defaults to the empty
//! string when absent so validation can answer with a precise
//! `BAD_REQUEST` instead of a parse failure; `client_id` selects which
//! subscriber identity the session operates on and falls back to the
//! session's own id.

use hubbub_broker::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Publish {
        #[serde(default)]
        topic: String,
        message: Option<Message>,
        request_id: Option<String>,
    },
    Subscribe {
        #[serde(default)]
        topic: String,
        client_id: Option<String>,
        last_n: Option<usize>,
        request_id: Option<String>,
    },
    Unsubscribe {
        #[serde(default)]
        topic: String,
        client_id: Option<String>,
        request_id: Option<String>,
    },
    Ping {
        request_id: Option<String>,
    },
}
