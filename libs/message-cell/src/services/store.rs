// libs/message-cell/src/services/store.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_models::{StoreError, StoreResult};
use sync_cell::{load_or_else, Change, StoreCore, Subscription, SyncContext, SyncError, SyncState};

use crate::models::{
    Message, MessageSync, MessagesChanged, NewMessage, UnreadCounts, MESSAGES_KEY, MESSAGE_CHANNEL,
};

pub struct MessageState {
    messages: Arc<Vec<Message>>,
}

impl MessageState {
    fn changed(&self) -> MessagesChanged {
        MessagesChanged {
            messages: Arc::clone(&self.messages),
        }
    }

    fn unread_from(&self, sender: &str, recipient: &str) -> usize {
        self.messages
            .iter()
            .filter(|msg| msg.is_unread_from(sender, recipient))
            .count()
    }

    fn mark_read(&mut self, recipient: &str, sender: &str) -> usize {
        let mut flipped = 0;
        for msg in Arc::make_mut(&mut self.messages).iter_mut() {
            if msg.is_unread_from(sender, recipient) {
                msg.is_read = true;
                flipped += 1;
            }
        }
        flipped
    }

    fn sorted(&self, keep: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut selected: Vec<Message> = self.messages.iter().filter(|msg| keep(*msg)).cloned().collect();
        selected.sort_by_key(|msg| msg.timestamp);
        selected
    }
}

impl SyncState for MessageState {
    type Event = MessagesChanged;
    type Message = MessageSync;

    fn blobs(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error> {
        Ok(vec![(MESSAGES_KEY, serde_json::to_string(&*self.messages)?)])
    }

    fn snapshot_events(&self) -> Vec<MessagesChanged> {
        vec![self.changed()]
    }

    fn apply_remote(&mut self, message: MessageSync) -> Vec<MessagesChanged> {
        match message {
            MessageSync::SingleRecordUpserted { payload } => {
                if self.messages.iter().any(|msg| msg.id == payload.id) {
                    debug!("Ignoring already known message {}", payload.id);
                    return Vec::new();
                }
                Arc::make_mut(&mut self.messages).push(payload);
                vec![self.changed()]
            }
            MessageSync::MarkRead { recipient, sender } => {
                if self.mark_read(&recipient, &sender) == 0 {
                    return Vec::new();
                }
                vec![self.changed()]
            }
        }
    }
}

/// Append-only chat log of one context.
#[derive(Clone)]
pub struct MessageStore {
    core: Arc<StoreCore<MessageState>>,
}

impl MessageStore {
    pub async fn open(ctx: &SyncContext) -> Self {
        let messages: Vec<Message> = load_or_else(ctx.persister().as_ref(), MESSAGES_KEY, Vec::new).await;
        info!("Loaded {} chat messages", messages.len());

        let state = MessageState {
            messages: Arc::new(messages),
        };
        Self {
            core: StoreCore::start(state, MESSAGE_CHANNEL, ctx),
        }
    }

    pub fn all(&self) -> Arc<Vec<Message>> {
        self.core.read(|state| Arc::clone(&state.messages))
    }

    /// Both directions between `a` and `b`, oldest first.
    pub fn conversation(&self, a: &str, b: &str) -> Vec<Message> {
        self.core.read(|state| state.sorted(|msg| msg.is_between(a, b)))
    }

    pub fn all_for_user(&self, user_id: &str) -> Vec<Message> {
        self.core
            .read(|state| state.sorted(|msg| msg.sender_id == user_id || msg.recipient_id == user_id))
    }

    pub fn unread_counts(&self, user_id: &str) -> UnreadCounts {
        self.core.read(|state| {
            let mut counts = UnreadCounts::new();
            for msg in state.messages.iter().filter(|msg| msg.recipient_id == user_id && !msg.is_read) {
                *counts.entry(msg.sender_id.clone()).or_default() += 1;
            }
            counts
        })
    }

    pub fn send(&self, message: NewMessage) -> StoreResult<Message> {
        if message.content.trim().is_empty() {
            return Err(StoreError::Validation("message content is empty".to_string()));
        }
        if message.recipient_id.trim().is_empty() {
            return Err(StoreError::Validation("message has no recipient".to_string()));
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            sender_role: message.sender_role,
            recipient_id: message.recipient_id,
            content: message.content,
            timestamp: Utc::now(),
            is_read: false,
        };
        debug!("Sending message {} from {} to {}", message.id, message.sender_id, message.recipient_id);

        self.core.mutate(|state| {
            Arc::make_mut(&mut state.messages).push(message.clone());
            Ok(Change::new(message.clone())
                .notify(state.changed())
                .broadcast(MessageSync::SingleRecordUpserted { payload: message }))
        })
    }

    /// Mark everything `sender` sent to `reader` as read. Returns how many
    /// messages flipped; nothing to flip leaves the store untouched.
    #[instrument(skip(self))]
    pub fn mark_as_read(&self, reader: &str, sender: &str) -> StoreResult<usize> {
        self.core.mutate(|state| {
            if state.unread_from(sender, reader) == 0 {
                return Ok(Change::unchanged(0));
            }

            let flipped = state.mark_read(reader, sender);
            Ok(Change::new(flipped)
                .notify(state.changed())
                .broadcast(MessageSync::MarkRead {
                    recipient: reader.to_string(),
                    sender: sender.to_string(),
                }))
        })
    }

    pub fn subscribe(&self, listener: impl Fn(&MessagesChanged) + Send + Sync + 'static) -> Subscription {
        self.core.subscribe(listener)
    }

    pub fn is_synced(&self) -> bool {
        self.core.is_synced()
    }

    pub async fn flush(&self) -> Result<bool, SyncError> {
        self.core.flush().await
    }

    pub async fn close(&self) -> Result<(), SyncError> {
        self.core.close().await
    }
}
