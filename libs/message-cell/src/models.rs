// libs/message-cell/src/models.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shared_models::Role;

pub const MESSAGE_CHANNEL: &str = "chat_messages";
pub const MESSAGES_KEY: &str = "chatMessages";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: Role,
    pub recipient_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
}

impl Message {
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.recipient_id == b) || (self.sender_id == b && self.recipient_id == a)
    }

    /// Unread message travelling from `sender` to `recipient`.
    pub fn is_unread_from(&self, sender: &str, recipient: &str) -> bool {
        !self.is_read && self.sender_id == sender && self.recipient_id == recipient
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: Role,
    pub recipient_id: String,
    pub content: String,
}

/// Unread messages addressed to one user, counted per sender.
pub type UnreadCounts = BTreeMap<String, usize>;

/// Delivered to local subscribers with the whole message log.
#[derive(Debug, Clone)]
pub struct MessagesChanged {
    pub messages: Arc<Vec<Message>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MessageSync {
    SingleRecordUpserted { payload: Message },
    /// `recipient` has read everything `sender` sent them.
    MarkRead { recipient: String, sender: String },
}
