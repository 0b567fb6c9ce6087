use std::sync::Weak;

/// A non-owning check on whether some external owner is still around.
///
/// Once a guard reports dead it is expected to stay dead.
pub trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

impl<O: ?Sized + Send + Sync> Liveness for Weak<O> {
    fn is_alive(&self) -> bool { self.strong_count() > 0 }
}

/// Adapts a closure into a [`Liveness`] guard
pub struct LivenessFn<F>(pub F);

impl<F> Liveness for LivenessFn<F>
where F: Fn() -> bool + Send + Sync
{
    fn is_alive(&self) -> bool { (self.0)() }
}
