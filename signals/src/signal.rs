use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use tracing::{debug, error, trace};

use crate::{IntoHandler, Subscription, error::panic_message};

/// A typed broadcast channel that owns an ordered set of subscriptions.
///
/// Subscribers are notified in the order they subscribed. `Signal` is a cheap handle: clones
/// share the same subscriptions. Dropping the last handle abandons every subscription without
/// running dispose callbacks.
pub struct Signal<T>(Arc<Inner<T>>);

struct Inner<T> {
    subscriptions: RwLock<Vec<Subscription<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.debug_struct("Signal").field("subscriptions", &self.len()).finish() }
}

impl<T> Default for Signal<T>
where T: Clone + Send + 'static
{
    fn default() -> Self { Self::new() }
}

impl<T> Signal<T> {
    /// Number of registered subscriptions, including canceled ones not yet flushed
    pub fn len(&self) -> usize { self.0.subscriptions.read().expect("subscriptions lock is poisoned").len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Drops subscriptions that can never fire again: canceled ones, and ones whose owner
    /// has been released. Runs at the start of every `fire`.
    pub fn flush(&self) {
        let mut subscriptions = self.0.subscriptions.write().expect("subscriptions lock is poisoned");
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.is_active());
        let removed = before - subscriptions.len();
        if removed > 0 {
            debug!(removed, remaining = subscriptions.len(), "flushed inactive subscriptions");
        }
    }

    /// Cancels every subscription, running their dispose callbacks, and forgets them
    pub fn cancel_all(&self) {
        let subscriptions = std::mem::take(&mut *self.0.subscriptions.write().expect("subscriptions lock is poisoned"));
        debug!(count = subscriptions.len(), "canceling all subscriptions");
        for subscription in subscriptions {
            subscription.cancel();
        }
    }
}

impl<T> Signal<T>
where T: Clone + Send + 'static
{
    pub fn new() -> Self { Self(Arc::new(Inner { subscriptions: RwLock::new(Vec::new()) })) }

    /// Registers `handler` and returns the subscription for further configuration
    pub fn subscribe<H>(&self, handler: H) -> Subscription<T>
    where H: IntoHandler<T> {
        let subscription = Subscription::new(handler.into_handler());
        trace!(id = %subscription.id(), "subscribed");
        self.0.subscriptions.write().expect("subscriptions lock is poisoned").push(subscription.clone());
        subscription
    }

    /// Sends `value` to every live subscription, in subscription order.
    ///
    /// Subscriptions added while this call is running do not receive `value`. A subscriber
    /// that panics is logged and skipped; the rest still receive the value.
    pub fn fire(&self, value: T) {
        self.flush();

        // Snapshot so handlers can subscribe or cancel without holding the lock
        let subscriptions = self.0.subscriptions.read().expect("subscriptions lock is poisoned").clone();

        // clone the value for each subscriber except the last one
        if let Some((last, rest)) = subscriptions.split_last() {
            for subscription in rest {
                notify(subscription, value.clone());
            }
            notify(last, value);
        }
    }
}

fn notify<T>(subscription: &Subscription<T>, value: T)
where T: Send + 'static {
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| subscription.fire(value))) {
        error!(id = %subscription.id(), "subscriber panicked: {}", panic_message(payload.as_ref()));
    }
}
