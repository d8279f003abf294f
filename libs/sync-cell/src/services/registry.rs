use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entry<E> {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener<E>,
}

struct RegistryInner<E> {
    next_id: u64,
    entries: Vec<Entry<E>>,
}

/// Ordered listener list for one store.
///
/// Listeners run in registration order with no lock held. The same closure
/// registered twice is invoked twice.
pub struct SubscriptionRegistry<E> {
    inner: Arc<Mutex<RegistryInner<E>>>,
}

impl<E: 'static> SubscriptionRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn register(&self, listener: Listener<E>) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push(Entry {
                id,
                active: Arc::clone(&active),
                listener,
            });
            id
        };

        let registry: Weak<Mutex<RegistryInner<E>>> = Arc::downgrade(&self.inner);
        Subscription {
            active,
            detach: Some(Box::new(move || {
                if let Some(inner) = registry.upgrade() {
                    inner.lock().entries.retain(|entry| entry.id != id);
                }
            })),
        }
    }

    pub fn notify(&self, event: &E) {
        // Iterate a snapshot so listeners may subscribe or unsubscribe
        // while being notified.
        let snapshot: Vec<(Arc<AtomicBool>, Listener<E>)> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.listener)))
            .collect();

        for (active, listener) in snapshot {
            if active.load(Ordering::SeqCst) {
                listener(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for SubscriptionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `subscribe`. Dropping it, or calling
/// [`Subscription::unsubscribe`], removes the listener; it is never invoked
/// afterwards, not even by a notification already in progress.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    active: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn dispose(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
