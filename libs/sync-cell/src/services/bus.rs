use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use shared_config::DEFAULT_BUS_CAPACITY;
use crate::{BusEnvelope, SyncError};

pub type BusSender = broadcast::Sender<BusEnvelope>;
pub type BusReceiver = broadcast::Receiver<BusEnvelope>;

/// Named, multi-writer, multi-reader change notification channels.
///
/// Delivery is best effort: a receiver created after a publish never sees
/// it, and a receiver that falls behind skips messages.
pub trait ChangeBus: Send + Sync {
    /// Returns how many receivers the envelope was handed to.
    fn publish(&self, channel: &str, envelope: BusEnvelope) -> Result<usize, SyncError>;

    fn subscribe(&self, channel: &str) -> Result<BusReceiver, SyncError>;
}

/// In-process bus shared by every context of the same origin.
pub struct LocalChangeBus {
    channels: Arc<RwLock<HashMap<String, BusSender>>>,
    capacity: usize,
}

impl LocalChangeBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn active_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn receiver_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    fn sender(&self, channel: &str) -> BusSender {
        if let Some(sender) = self.channels.read().get(channel) {
            return sender.clone();
        }

        let mut channels = self.channels.write();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| {
                debug!("Created bus channel '{}'", channel);
                broadcast::channel(self.capacity).0
            })
            .clone()
    }
}

impl ChangeBus for LocalChangeBus {
    fn publish(&self, channel: &str, envelope: BusEnvelope) -> Result<usize, SyncError> {
        match self.sender(channel).send(envelope) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                // Nobody listening
                debug!("No receivers on bus channel '{}'", channel);
                Ok(0)
            }
        }
    }

    fn subscribe(&self, channel: &str) -> Result<BusReceiver, SyncError> {
        Ok(self.sender(channel).subscribe())
    }
}

impl Default for LocalChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LocalChangeBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            capacity: self.capacity,
        }
    }
}

/// A bus that cannot be opened, as in an environment without cross-context
/// messaging. Stores built on it run local-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableChangeBus;

impl ChangeBus for UnavailableChangeBus {
    fn publish(&self, channel: &str, _envelope: BusEnvelope) -> Result<usize, SyncError> {
        Err(SyncError::ChannelUnavailable(channel.to_string()))
    }

    fn subscribe(&self, channel: &str) -> Result<BusReceiver, SyncError> {
        Err(SyncError::ChannelUnavailable(channel.to_string()))
    }
}
