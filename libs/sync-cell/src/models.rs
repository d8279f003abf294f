use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one execution context (one open portal tab or window).
pub type ContextId = Uuid;

/// Unit carried on a change bus channel.
///
/// `body` is the JSON encoding of the store-specific sync message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub origin: ContextId,
    pub sent_at: DateTime<Utc>,
    pub body: String,
}

impl BusEnvelope {
    pub fn new(origin: ContextId, body: String) -> Self {
        Self {
            origin,
            sent_at: Utc::now(),
            body,
        }
    }
}
