//! Minimal publish/subscribe used for change notification.
//!
//! Listeners run synchronously on the emitting task, in subscription order.
//! The listener list is snapshotted before delivery, so a listener may
//! subscribe or unsubscribe without deadlocking.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenerSet<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

pub struct Notifier<E> {
    set: Arc<Mutex<ListenerSet<E>>>,
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Notifier<E> {
    pub fn new() -> Self {
        Self {
            set: Arc::new(Mutex::new(ListenerSet {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut set = self.set.lock();
        let id = set.next_id;
        set.next_id += 1;
        set.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            set: Arc::downgrade(&self.set),
        }
    }

    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .set
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        trace!(listeners = listeners.len(), "notifying");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.set.lock().listeners.len()
    }
}

/// Returned by [`Notifier::subscribe`]. Dropping it keeps the listener
/// attached; call [`Subscription::unsubscribe`] to detach.
pub struct Subscription<E> {
    id: u64,
    set: Weak<Mutex<ListenerSet<E>>>,
}

impl<E> Subscription<E> {
    /// Returns `false` if the listener was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(set) = self.set.upgrade() else {
            return false;
        };
        let mut set = set.lock();
        let before = set.listeners.len();
        set.listeners.retain(|(id, _)| *id != self.id);
        set.listeners.len() != before
    }
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_subscription_order() {
        let notifier = Notifier::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = seen.clone();
            notifier.subscribe(move |n: &u32| seen.lock().push(format!("{tag}{n}")));
        }
        notifier.emit(&1);
        notifier.emit(&2);
        assert_eq!(*seen.lock(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn unsubscribe_detaches_once() {
        let notifier = Notifier::<()>::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let subscription = notifier.subscribe(move |_| *counter.lock() += 1);
        notifier.emit(&());
        assert!(subscription.unsubscribe());
        notifier.emit(&());
        assert_eq!(*hits.lock(), 1);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn listener_may_subscribe_during_emit() {
        let notifier = Arc::new(Notifier::<()>::new());
        let inner = notifier.clone();
        notifier.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        notifier.emit(&());
        assert_eq!(notifier.listener_count(), 2);
    }
}
