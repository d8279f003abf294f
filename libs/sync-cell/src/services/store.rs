use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex as FlushLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::StoreResult;
use crate::services::bus::{BusReceiver, ChangeBus};
use crate::services::persistence::Persister;
use crate::services::registry::{Listener, Subscription, SubscriptionRegistry};
use crate::{BusEnvelope, ContextId, SyncError};

/// Collaborators shared by every store opened in one execution context.
#[derive(Clone)]
pub struct SyncContext {
    origin: ContextId,
    persister: Arc<dyn Persister>,
    bus: Option<Arc<dyn ChangeBus>>,
    flush_interval: Duration,
}

impl SyncContext {
    /// A context with no change bus: stores stay local-only.
    pub fn new(persister: Arc<dyn Persister>, flush_interval: Duration) -> Self {
        Self {
            origin: Uuid::new_v4(),
            persister,
            bus: None,
            flush_interval,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        persister: Arc<dyn Persister>,
        bus: Arc<dyn ChangeBus>,
    ) -> Self {
        Self::new(persister, config.flush_interval()).with_bus(bus)
    }

    pub fn with_bus(mut self, bus: Arc<dyn ChangeBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn origin(&self) -> ContextId {
        self.origin
    }

    pub fn persister(&self) -> &Arc<dyn Persister> {
        &self.persister
    }

    pub fn bus(&self) -> Option<&Arc<dyn ChangeBus>> {
        self.bus.as_ref()
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

/// In-memory state of one entity family and how it travels.
pub trait SyncState: Send + 'static {
    /// Payload handed to local listeners.
    type Event: Send + Sync + 'static;
    /// Message exchanged with the same store in other contexts.
    type Message: Serialize + DeserializeOwned + Send + 'static;

    /// Every `(key, blob)` pair written on a flush.
    fn blobs(&self) -> Result<Vec<(&'static str, String)>, serde_json::Error>;

    /// Events describing the current state, delivered to a new subscriber.
    fn snapshot_events(&self) -> Vec<Self::Event>;

    /// Merge a message received from another context.
    fn apply_remote(&mut self, message: Self::Message) -> Vec<Self::Event>;
}

/// Result of a successful mutation: the value returned to the caller plus
/// what to tell local listeners and other contexts.
pub struct Change<S: SyncState, R> {
    pub value: R,
    pub events: Vec<S::Event>,
    pub broadcast: Option<S::Message>,
    pub persist: bool,
}

impl<S: SyncState, R> Change<S, R> {
    pub fn new(value: R) -> Self {
        Self {
            value,
            events: Vec::new(),
            broadcast: None,
            persist: true,
        }
    }

    /// The operation left the state as it was: nothing is notified,
    /// broadcast or flushed.
    pub fn unchanged(value: R) -> Self {
        Self {
            persist: false,
            ..Self::new(value)
        }
    }

    pub fn notify(mut self, event: S::Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn broadcast(mut self, message: S::Message) -> Self {
        self.broadcast = Some(message);
        self
    }
}

/// Sole owner of one family's collection within a context.
///
/// A successful mutation, in order: notifies local listeners, publishes on
/// the bus, marks the state dirty for the next periodic flush.
///
/// Dirtiness is tracked as a pair of revisions: `revision` moves on every
/// change and `persisted` records the last revision fully written. A flush
/// that is interrupted or fails leaves the two apart.
pub struct StoreCore<S: SyncState> {
    channel: &'static str,
    origin: ContextId,
    state: Mutex<S>,
    listeners: SubscriptionRegistry<S::Event>,
    revision: AtomicU64,
    persisted: AtomicU64,
    flushing: FlushLock<()>,
    persister: Arc<dyn Persister>,
    publisher: Option<Arc<dyn ChangeBus>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: SyncState> StoreCore<S> {
    /// Take ownership of `state` and start the bus listener and the flush
    /// ticker. Must be called from within a tokio runtime.
    pub fn start(state: S, channel: &'static str, ctx: &SyncContext) -> Arc<Self> {
        let receiver = ctx.bus().and_then(|bus| match bus.subscribe(channel) {
            Ok(receiver) => Some(receiver),
            Err(e) => {
                warn!(channel, error = %e, "change bus unavailable; store runs local-only");
                None
            }
        });
        let publisher = receiver.as_ref().and(ctx.bus().cloned());

        let core = Arc::new(Self {
            channel,
            origin: ctx.origin(),
            state: Mutex::new(state),
            listeners: SubscriptionRegistry::new(),
            revision: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
            flushing: FlushLock::new(()),
            persister: Arc::clone(ctx.persister()),
            publisher,
            tasks: Mutex::new(Vec::new()),
        });

        let mut tasks = Vec::with_capacity(2);
        if let Some(receiver) = receiver {
            tasks.push(tokio::spawn(listen(Arc::downgrade(&core), receiver)));
        }
        tasks.push(tokio::spawn(flush_periodically(
            Arc::downgrade(&core),
            ctx.flush_interval(),
        )));
        *core.tasks.lock() = tasks;

        info!(channel, origin = %core.origin, synced = core.is_synced(), "store started");
        core
    }

    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Whether mutations reach other contexts.
    pub fn is_synced(&self) -> bool {
        self.publisher.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.revision.load(Ordering::SeqCst) != self.persisted.load(Ordering::SeqCst)
    }

    fn mark_dirty(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.state.lock();
        f(&state)
    }

    pub fn mutate<R>(
        &self,
        op: impl FnOnce(&mut S) -> StoreResult<Change<S, R>>,
    ) -> StoreResult<R> {
        let change = {
            let mut state = self.state.lock();
            op(&mut state)?
        };

        for event in &change.events {
            self.listeners.notify(event);
        }
        if let Some(message) = change.broadcast {
            self.publish(&message);
        }
        if change.persist {
            self.mark_dirty();
        }

        Ok(change.value)
    }

    /// Register `listener` and invoke it at once with the current state.
    pub fn subscribe(&self, listener: impl Fn(&S::Event) + Send + Sync + 'static) -> Subscription {
        let listener: Listener<S::Event> = Arc::new(listener);
        let subscription = self.listeners.register(Arc::clone(&listener));

        let current = self.read(|state| state.snapshot_events());
        for event in &current {
            listener(event);
        }

        subscription
    }

    /// Write every blob if anything changed since the last flush.
    /// Returns whether a write happened.
    ///
    /// Flushes run one at a time. The state counts as persisted only once
    /// every blob has been saved.
    pub async fn flush(&self) -> Result<bool, SyncError> {
        let _guard = self.flushing.lock().await;
        if !self.is_dirty() {
            return Ok(false);
        }

        let (revision, blobs) = {
            let state = self.state.lock();
            (self.revision.load(Ordering::SeqCst), state.blobs())
        };
        let blobs = blobs.map_err(SyncError::Serialization)?;

        for (key, blob) in blobs {
            self.persister.save(key, &blob).await?;
        }

        self.persisted.fetch_max(revision, Ordering::SeqCst);
        debug!(channel = self.channel, revision, "flushed store");
        Ok(true)
    }

    /// Stop the background tasks and write any pending change.
    ///
    /// A periodic flush cut short by the stop never counts as persisted, so
    /// the final flush writes the latest state again.
    pub async fn close(&self) -> Result<(), SyncError> {
        self.stop_tasks();
        self.flush().await?;
        info!(channel = self.channel, origin = %self.origin, "store closed");
        Ok(())
    }

    fn stop_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    fn publish(&self, message: &S::Message) {
        let Some(bus) = &self.publisher else {
            return;
        };

        let body = match serde_json::to_string(message) {
            Ok(body) => body,
            Err(e) => {
                error!(channel = self.channel, error = %e, "failed to encode sync message");
                return;
            }
        };

        match bus.publish(self.channel, BusEnvelope::new(self.origin, body)) {
            Ok(receivers) => debug!(channel = self.channel, receivers, "published change"),
            Err(e) => warn!(channel = self.channel, error = %e, "failed to publish change"),
        }
    }

    fn receive(&self, envelope: BusEnvelope) {
        if envelope.origin == self.origin {
            return;
        }

        let message: S::Message = match serde_json::from_str(&envelope.body) {
            Ok(message) => message,
            Err(e) => {
                warn!(channel = self.channel, error = %e, "ignoring undecodable sync message");
                return;
            }
        };

        let events = {
            let mut state = self.state.lock();
            state.apply_remote(message)
        };
        self.mark_dirty();

        debug!(channel = self.channel, from = %envelope.origin, "applied remote change");
        for event in &events {
            self.listeners.notify(event);
        }
    }
}

impl<S: SyncState> Drop for StoreCore<S> {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

async fn listen<S: SyncState>(core: Weak<StoreCore<S>>, mut receiver: BusReceiver) {
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                let Some(core) = core.upgrade() else {
                    break;
                };
                core.receive(envelope);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "store fell behind on the change bus; messages lost");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn flush_periodically<S: SyncState>(core: Weak<StoreCore<S>>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(core) = core.upgrade() else {
            break;
        };
        if let Err(e) = core.flush().await {
            error!(channel = core.channel, error = %e, "periodic flush failed");
        }
    }
}
