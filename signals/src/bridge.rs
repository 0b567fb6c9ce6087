//! Adapts a [`Property`]'s change hooks into signals and other forwarding targets.

mod property;

pub use property::*;

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, trace};

use crate::Signal;

/// A forwarding target for observed property values
pub trait Receive<V>: Send + Sync {
    fn receive(&self, value: &V);
}

/// Forwards changes of one property to any number of [`Receive`] targets.
///
/// All targets share a single hook on the property. The hook is registered when the first
/// target is added and removed again when the last one leaves, on [`stop_observing`](Self::stop_observing),
/// or when the observation is dropped.
pub struct PropertyObservation<V> {
    property: WeakProperty<V>,
    targets: Arc<Targets<V>>,
}

struct Targets<V>(Mutex<TargetState<V>>);

struct TargetState<V> {
    receivers: Vec<Arc<dyn Receive<V>>>,
    hook: Option<HookId>,
}

impl<V> Targets<V> {
    fn state(&self) -> MutexGuard<'_, TargetState<V>> { self.0.lock().expect("observation targets lock is poisoned") }

    fn forward(&self, value: &V) {
        let receivers = self.state().receivers.clone();
        for receiver in receivers {
            receiver.receive(value);
        }
    }
}

fn same_receiver<V, R: ?Sized>(a: &Arc<dyn Receive<V>>, b: &Arc<R>) -> bool { Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const () }

impl<V> PropertyObservation<V>
where V: 'static
{
    /// Observes `property` without keeping it alive
    pub fn new(property: &Property<V>) -> Self {
        Self { property: property.downgrade(), targets: Arc::new(Targets(Mutex::new(TargetState { receivers: Vec::new(), hook: None }))) }
    }

    /// Starts forwarding changes to `receiver`
    pub fn add<R>(&self, receiver: Arc<R>)
    where R: Receive<V> + 'static {
        let mut state = self.targets.state();
        state.receivers.push(receiver);
        if state.hook.is_none() {
            if let Some(property) = self.property.upgrade() {
                let targets: Weak<Targets<V>> = Arc::downgrade(&self.targets);
                state.hook = Some(property.add_hook(move |value: &V| {
                    if let Some(targets) = targets.upgrade() {
                        targets.forward(value)
                    }
                }));
                debug!("started observing property");
            }
        }
    }

    /// Stops forwarding to `receiver`. Unknown receivers are ignored.
    pub fn remove<R>(&self, receiver: &Arc<R>)
    where R: ?Sized {
        let mut state = self.targets.state();
        let Some(index) = state.receivers.iter().position(|existing| same_receiver(existing, receiver)) else {
            trace!("receiver was not observing");
            return;
        };
        state.receivers.remove(index);
        if state.receivers.is_empty() {
            self.unhook(&mut state);
        }
    }

    /// Drops every receiver and the underlying hook
    pub fn stop_observing(&self) {
        let mut state = self.targets.state();
        state.receivers.clear();
        self.unhook(&mut state);
    }

    pub fn is_observing(&self) -> bool { self.targets.state().hook.is_some() }

    pub fn receiver_count(&self) -> usize { self.targets.state().receivers.len() }

    fn unhook(&self, state: &mut TargetState<V>) {
        if let Some(hook) = state.hook.take() {
            if let Some(property) = self.property.upgrade() {
                property.remove_hook(hook);
            }
            debug!("stopped observing property");
        }
    }
}

impl<V> Drop for PropertyObservation<V> {
    fn drop(&mut self) {
        let mut state = self.targets.state();
        state.receivers.clear();
        if let (Some(hook), Some(property)) = (state.hook.take(), self.property.upgrade()) {
            property.remove_hook(hook);
        }
    }
}

/// A [`Signal`] that can be fed from a [`PropertyObservation`].
///
/// Observed values are converted with `TryFrom`; values that do not convert are dropped.
pub struct ReceiverSignal<T>(Signal<T>);

impl<T> ReceiverSignal<T>
where T: Clone + Send + 'static
{
    pub fn new() -> Self { Self(Signal::new()) }
}

impl<T> Default for ReceiverSignal<T>
where T: Clone + Send + 'static
{
    fn default() -> Self { Self::new() }
}

impl<T> Clone for ReceiverSignal<T> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> Deref for ReceiverSignal<T> {
    type Target = Signal<T>;
    fn deref(&self) -> &Signal<T> { &self.0 }
}

impl<T, V> Receive<V> for ReceiverSignal<T>
where
    T: TryFrom<V> + Clone + Send + 'static,
    V: Clone,
{
    fn receive(&self, value: &V) {
        match T::try_from(value.clone()) {
            Ok(value) => self.0.fire(value),
            Err(_) => trace!("dropping observed value that does not convert"),
        }
    }
}

/// Writes every received value into another property, held weakly
pub struct PropertyBinding<V>(WeakProperty<V>);

impl<V> PropertyBinding<V> {
    pub fn new(target: &Property<V>) -> Self { Self(target.downgrade()) }
}

impl<V> Receive<V> for PropertyBinding<V>
where V: Clone + Send + Sync
{
    fn receive(&self, value: &V) {
        if let Some(target) = self.0.upgrade() {
            target.set(value.clone());
        }
    }
}
