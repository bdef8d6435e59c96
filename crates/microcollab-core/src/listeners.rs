//! Subscription registry for generated events.
//!
//! Views register a callback with [`Listeners::subscribe`] and get back a
//! [`Subscription`]. Dropping the subscription (or calling
//! [`Subscription::unsubscribe`]) removes the callback, so a view that
//! unmounts cannot leak its listener.
//!
//! [`Listeners::notify`] invokes callbacks synchronously in registration
//! order. The registry lock is released before any callback runs, so a
//! callback may subscribe, unsubscribe, or read the store. A panicking
//! callback is caught and logged; the remaining callbacks still run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use microcollab_types::Event;
use tracing::error;

/// A registered event callback.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Registered callbacks in registration order.
#[derive(Default)]
struct Registry {
    entries: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, id: u64) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }
}

/// Shared, cloneable handle to the subscription registry.
#[derive(Clone, Default)]
pub struct Listeners {
    registry: Arc<Registry>,
}

impl core::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

impl Listeners {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked once per generated event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut entries) = self.registry.entries.lock() {
            entries.push((id, Arc::new(callback)));
        }
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invoke every registered callback with `event`, in registration
    /// order. Returns the number of callbacks that completed without
    /// panicking.
    pub fn notify(&self, event: &Event) -> usize {
        let snapshot: Vec<(u64, Listener)> = match self.registry.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        let mut delivered: usize = 0;
        for (id, listener) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| (listener.as_ref())(event))) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(_) => {
                    error!(
                        listener = id,
                        event_id = %event.id,
                        event_type = ?event.event_type,
                        "Event listener panicked; continuing with remaining listeners"
                    );
                }
            }
        }
        delivered
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.registry
            .entries
            .lock()
            .map_or(0, |entries| entries.len())
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every callback. Outstanding [`Subscription`]s become no-ops.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.registry.entries.lock() {
            entries.clear();
        }
    }
}

/// Disposer for a registered callback.
///
/// Dropping it unsubscribes. Use [`Subscription::detach`] to keep the
/// callback registered for the lifetime of the registry.
#[must_use = "dropping a Subscription immediately unsubscribes its listener"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the callback now. Returns whether it was still registered.
    pub fn unsubscribe(mut self) -> bool {
        self.remove()
    }

    /// Keep the callback registered without holding the disposer.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }

    fn remove(&mut self) -> bool {
        let removed = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id));
        self.registry = Weak::new();
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.remove();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::Utc;
    use microcollab_types::{
        EventId, EventPayload, EventType, OfferId, RequestId, Session, SessionId, SessionStatus,
        UserId,
    };

    use super::*;

    fn make_event() -> Event {
        Event {
            id: EventId::new(),
            event_type: EventType::SessionCompleted,
            timestamp: Utc::now(),
            payload: EventPayload::Session(Session {
                id: SessionId::new(),
                request_id: RequestId::new(),
                offer_id: OfferId::new(),
                requester_id: UserId::new(),
                helper_id: UserId::new(),
                status: SessionStatus::Completed,
                started_at: Utc::now(),
                completed_at: Some(Utc::now()),
            }),
            summary: String::from("done"),
        }
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let listeners = Listeners::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..3)
            .map(|n| {
                let order = Arc::clone(&order);
                listeners.subscribe(move |_| order.lock().unwrap().push(n))
            })
            .collect();

        assert_eq!(listeners.notify(&make_event()), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let listeners = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = listeners.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let _ = listeners.notify(&make_event());
        drop(sub);
        let _ = listeners.notify(&make_event());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn unsubscribe_reports_removal_once() {
        let listeners = Listeners::new();
        let sub = listeners.subscribe(|_| {});
        assert_eq!(listeners.len(), 1);
        assert!(sub.unsubscribe());
        assert!(listeners.is_empty());
    }

    #[test]
    fn detached_subscription_stays_registered() {
        let listeners = Listeners::new();
        listeners.subscribe(|_| {}).detach();
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_rest() {
        let listeners = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let first = {
            let hits = Arc::clone(&hits);
            listeners.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let faulty = listeners.subscribe(|_| panic!("view crashed"));
        let last = {
            let hits = Arc::clone(&hits);
            listeners.subscribe(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };

        let delivered = listeners.notify(&make_event());
        assert_eq!(delivered, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(listeners.len(), 3);
        drop((first, faulty, last));
    }

    #[test]
    fn callback_may_subscribe_during_notify() {
        let listeners = Listeners::new();
        let inner = listeners.clone();
        let spawned = Arc::new(Mutex::new(Vec::new()));
        let holder = Arc::clone(&spawned);
        let sub = listeners.subscribe(move |_| {
            holder.lock().unwrap().push(inner.subscribe(|_| {}));
        });

        assert_eq!(listeners.notify(&make_event()), 1);
        assert_eq!(listeners.len(), 2);
        drop(sub);
    }

    #[test]
    fn clear_turns_subscriptions_into_no_ops() {
        let listeners = Listeners::new();
        let sub = listeners.subscribe(|_| {});
        listeners.clear();
        assert!(!sub.unsubscribe());
    }
}
