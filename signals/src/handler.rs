use std::sync::Arc;

/// A subscription's value handler
pub type Handler<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Called once when a subscription is canceled
pub type Dispose = Box<dyn FnOnce() + Send + 'static>;

/// Drops values before they reach the handler (or the throttle) when it returns false
pub type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync + 'static>;

/// Trait for types that can be converted into a subscription handler.
pub trait IntoHandler<T> {
    fn into_handler(self) -> Handler<T>;
}

// Implementation for function types
impl<F, T> IntoHandler<T> for F
where F: Fn(T) + Send + Sync + 'static
{
    fn into_handler(self) -> Handler<T> { Arc::new(self) }
}

impl<T> IntoHandler<T> for Handler<T> {
    fn into_handler(self) -> Handler<T> { self }
}

#[cfg(feature = "tokio")]
impl<T> IntoHandler<T> for tokio::sync::mpsc::UnboundedSender<T>
where T: Send + 'static
{
    fn into_handler(self) -> Handler<T> {
        Arc::new(move |value| {
            let _ = self.send(value); // Ignore send errors
        })
    }
}

impl<T> IntoHandler<T> for std::sync::mpsc::Sender<T>
where T: Send + 'static
{
    fn into_handler(self) -> Handler<T> {
        Arc::new(move |value| {
            let _ = self.send(value); // Ignore send errors
        })
    }
}
