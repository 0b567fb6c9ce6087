use thiserror::Error;

/// Failure to hand a job to an [`ExecutionContext`](crate::ExecutionContext)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no tokio runtime is available on this thread")]
    NoRuntime,
    #[error("execution context is closed")]
    Closed,
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
