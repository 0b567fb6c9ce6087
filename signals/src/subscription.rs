use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::{
    ExecutionContext, Liveness,
    handler::{Dispose, Filter, Handler},
    sampler::Sampler,
};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(usize);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// One registration on a [`Signal`](crate::Signal), with its own dispatch policy.
///
/// The configuration methods consume and return the handle so they can be chained straight
/// off `subscribe`. Each replaces any earlier setting of the same kind. Configure before values
/// start flowing; reconfiguring a subscription that is being fired concurrently is not supported.
///
/// Clones are handles to the same registration. Dropping a handle does not cancel anything.
pub struct Subscription<T>(Arc<Inner<T>>);

struct Inner<T> {
    id: SubscriptionId,
    config: Mutex<Config<T>>,
}

struct Config<T> {
    // cleared exactly once, by cancel
    handler: Option<Handler<T>>,
    dispose: Option<Dispose>,
    filter: Option<Filter<T>>,
    context: Option<Arc<dyn ExecutionContext>>,
    liveness: Option<Box<dyn Liveness>>,
    sampler: Option<Arc<Sampler<T>>>,
}

impl<T> Config<T> {
    fn is_alive(&self) -> bool { self.liveness.as_ref().is_none_or(|guard| guard.is_alive()) }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.0.id).field("active", &self.is_active()).finish()
    }
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId { self.0.id }

    /// True until canceled, and only while the liveness guard (if any) reports alive
    pub fn is_active(&self) -> bool {
        let config = self.0.config();
        config.handler.is_some() && config.is_alive()
    }

    /// Marks the subscription inert and runs the dispose callback, at most once.
    ///
    /// Deliveries already handed to an execution context are not retracted, but they check
    /// the subscription again before calling the handler. Skips the dispose callback when the
    /// liveness guard reports the owner gone.
    pub fn cancel(&self) {
        let (dispose, context, alive) = {
            let mut config = self.0.config();
            if config.handler.take().is_none() {
                return;
            }
            (config.dispose.take(), config.context.clone(), config.is_alive())
        };
        debug!(id = %self.0.id, "subscription canceled");

        match dispose {
            Some(dispose) if alive => run_on(context.as_ref(), dispose),
            Some(_) => trace!(id = %self.0.id, "owner released, skipping dispose"),
            None => {}
        }
    }
}

impl<T> Subscription<T>
where T: Send + 'static
{
    pub(crate) fn new(handler: Handler<T>) -> Self {
        let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        Self(Arc::new(Inner {
            id,
            config: Mutex::new(Config { handler: Some(handler), dispose: None, filter: None, context: None, liveness: None, sampler: None }),
        }))
    }

    /// Called once, when the subscription is canceled
    pub fn dispose<F>(self, dispose: F) -> Self
    where F: FnOnce() + Send + 'static {
        self.0.config().dispose = Some(Box::new(dispose));
        self
    }

    /// Run the handler and the dispose callback on `context` instead of the firing thread
    pub fn queue<C>(self, context: C) -> Self
    where C: ExecutionContext + 'static {
        let context: Arc<dyn ExecutionContext> = Arc::new(context);
        let mut config = self.0.config();
        if let Some(sampler) = &config.sampler {
            sampler.set_context(Some(context.clone()));
        }
        config.context = Some(context);
        drop(config);
        self
    }

    /// Only values for which `predicate` returns true are delivered
    pub fn filter<F>(self, predicate: F) -> Self
    where F: Fn(&T) -> bool + Send + Sync + 'static {
        self.0.config().filter = Some(Arc::new(predicate));
        self
    }

    /// Deliver at most one value per `interval`, always the latest one.
    /// Calling this again changes the interval of the existing throttle.
    ///
    /// Without a `queue` context the throttle's timers run on the tokio runtime current at the
    /// first call, so the signal may then be fired from any thread.
    pub fn sample(self, interval: Duration) -> Self {
        let mut config = self.0.config();
        let context = config.context.clone();
        let sampler = config.sampler.get_or_insert_with(|| {
            let inner = Arc::downgrade(&self.0);
            Sampler::new(
                move |value| {
                    if let Some(inner) = inner.upgrade() {
                        deliver(&inner, value)
                    }
                },
                context,
            )
        });
        sampler.set_interval(interval);
        drop(config);
        self
    }

    /// Stop firing once `observer` has been dropped everywhere else
    pub fn with<O>(self, observer: &Arc<O>) -> Self
    where O: ?Sized + Send + Sync + 'static {
        self.with_guard(Arc::downgrade(observer))
    }

    /// Stop firing once `guard` reports dead
    pub fn with_guard<L>(self, guard: L) -> Self
    where L: Liveness + 'static {
        self.0.config().liveness = Some(Box::new(guard));
        self
    }

    pub(crate) fn fire(&self, value: T) {
        let (filter, sampler) = {
            let config = self.0.config();
            if !config.is_alive() || config.handler.is_none() {
                return;
            }
            (config.filter.clone(), config.sampler.clone())
        };

        if let Some(filter) = filter {
            if !filter(&value) {
                trace!(id = %self.0.id, "value filtered out");
                return;
            }
        }

        match sampler {
            Some(sampler) => sampler.enqueue(value),
            None => deliver(&self.0, value),
        }
    }
}

impl<T> Inner<T> {
    fn config(&self) -> MutexGuard<'_, Config<T>> { self.config.lock().expect("subscription config lock is poisoned") }

    /// The handler, if the subscription may still fire
    fn live_handler(&self) -> Option<Handler<T>> {
        let config = self.config();
        if config.is_alive() { config.handler.clone() } else { None }
    }
}

/// Hands `value` to the handler, on the configured context if there is one
fn deliver<T>(inner: &Arc<Inner<T>>, value: T)
where T: Send + 'static {
    let Some(handler) = inner.live_handler() else { return };
    let context = inner.config().context.clone();

    match context {
        Some(context) => {
            let inner = inner.clone();
            run_on(Some(&context), move || {
                // canceled while queued
                if inner.live_handler().is_some() {
                    handler(value)
                }
            })
        }
        None => handler(value),
    }
}

fn run_on<F>(context: Option<&Arc<dyn ExecutionContext>>, job: F)
where F: FnOnce() + Send + 'static {
    match context {
        Some(context) => {
            if let Err(error) = context.execute(Box::new(job)) {
                warn!("dropping deferred subscription callback: {error}");
            }
        }
        None => job(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::IntoHandler;

    fn counting() -> (Handler<u32>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = {
            let count = count.clone();
            (move |_: u32| {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .into_handler()
        };
        (handler, count)
    }

    #[test]
    fn test_last_filter_wins() {
        let (handler, count) = counting();
        let subscription = Subscription::new(handler).filter(|v| *v > 100).filter(|v| *v % 2 == 0);

        subscription.fire(4);
        subscription.fire(5);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_clears_handler_once() {
        let (handler, count) = counting();
        let disposed = Arc::new(AtomicUsize::new(0));
        let subscription = {
            let disposed = disposed.clone();
            Subscription::new(handler).dispose(move || {
                disposed.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert!(subscription.is_active());
        subscription.cancel();
        subscription.cancel();
        subscription.fire(1);

        assert!(!subscription.is_active());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_released_owner_suppresses_fire_and_dispose() {
        let (handler, count) = counting();
        let disposed = Arc::new(AtomicUsize::new(0));
        let owner = Arc::new(());
        let subscription = {
            let disposed = disposed.clone();
            Subscription::new(handler)
                .dispose(move || {
                    disposed.fetch_add(1, Ordering::SeqCst);
                })
                .with(&owner)
        };

        subscription.fire(1);
        drop(owner);
        subscription.fire(2);
        assert!(!subscription.is_active());

        subscription.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(disposed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let (handler, _) = counting();
        let a = Subscription::new(handler.clone());
        let b = Subscription::new(handler);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
