use std::{sync::Arc, time::Duration};

use crate::DispatchError;

/// A deferred unit of work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The scheduling domain on which deferred handler, dispose and timer callbacks run.
///
/// Both methods return as soon as the job is scheduled. Jobs that were accepted are never
/// retracted, not even when the subscription that scheduled them is canceled afterwards.
pub trait ExecutionContext: Send + Sync {
    /// Run `job` asynchronously, as soon as the context gets to it
    fn execute(&self, job: Job) -> Result<(), DispatchError>;

    /// Run `job` asynchronously once `delay` has elapsed
    fn execute_after(&self, delay: Duration, job: Job) -> Result<(), DispatchError>;
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Arc<C> {
    fn execute(&self, job: Job) -> Result<(), DispatchError> { (**self).execute(job) }
    fn execute_after(&self, delay: Duration, job: Job) -> Result<(), DispatchError> { (**self).execute_after(delay, job) }
}

#[cfg(feature = "tokio")]
pub use self::tokio_contexts::*;

#[cfg(feature = "tokio")]
mod tokio_contexts {
    use std::{panic::AssertUnwindSafe, time::Duration};

    use tokio::{runtime::Handle, sync::mpsc, time::Instant};
    use tracing::{debug, error, trace};

    use super::{ExecutionContext, Job};
    use crate::{DispatchError, error::panic_message};

    /// Measured from the moment of scheduling, on the runtime's clock
    fn deadline_after(handle: &Handle, delay: Duration) -> Instant {
        let _runtime = handle.enter();
        Instant::now() + delay
    }

    /// Runs every job as its own task on a tokio runtime.
    /// Jobs are not ordered relative to each other.
    #[derive(Clone, Debug)]
    pub struct TokioContext(Handle);

    impl TokioContext {
        pub fn new(handle: Handle) -> Self { Self(handle) }

        /// The runtime the calling thread is running on
        pub fn current() -> Result<Self, DispatchError> { Handle::try_current().map(Self).map_err(|_| DispatchError::NoRuntime) }
    }

    impl ExecutionContext for TokioContext {
        fn execute(&self, job: Job) -> Result<(), DispatchError> {
            self.0.spawn(async move { job() });
            Ok(())
        }

        fn execute_after(&self, delay: Duration, job: Job) -> Result<(), DispatchError> {
            let deadline = deadline_after(&self.0, delay);
            self.0.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                job()
            });
            Ok(())
        }
    }

    /// Runs jobs one at a time, in the order they were submitted, on a single worker task.
    ///
    /// Clones share the worker. The worker exits once every clone (and every pending delayed
    /// job) is gone. A panicking job is logged and does not stop the queue.
    #[derive(Clone, Debug)]
    pub struct SerialQueue {
        handle: Handle,
        sender: mpsc::UnboundedSender<Job>,
    }

    impl SerialQueue {
        /// Start a queue on the runtime the calling thread is running on
        pub fn new() -> Result<Self, DispatchError> {
            let handle = Handle::try_current().map_err(|_| DispatchError::NoRuntime)?;
            Ok(Self::on(&handle))
        }

        /// Start a queue on the given runtime
        pub fn on(handle: &Handle) -> Self {
            let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
            handle.spawn(async move {
                while let Some(job) = receiver.recv().await {
                    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(job)) {
                        error!("serial queue job panicked: {}", panic_message(payload.as_ref()));
                    }
                }
                trace!("serial queue worker finished");
            });
            Self { handle: handle.clone(), sender }
        }
    }

    impl ExecutionContext for SerialQueue {
        fn execute(&self, job: Job) -> Result<(), DispatchError> { self.sender.send(job).map_err(|_| DispatchError::Closed) }

        fn execute_after(&self, delay: Duration, job: Job) -> Result<(), DispatchError> {
            if self.sender.is_closed() {
                return Err(DispatchError::Closed);
            }
            let sender = self.sender.clone();
            let deadline = deadline_after(&self.handle, delay);
            self.handle.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if sender.send(job).is_err() {
                    debug!("serial queue closed before a delayed job came due");
                }
            });
            Ok(())
        }
    }
}

#[cfg(all(test, feature = "tokio"))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_no_runtime() {
        assert_eq!(assert_err!(TokioContext::current()), DispatchError::NoRuntime);
        assert_eq!(assert_err!(SerialQueue::new()).to_string(), "no tokio runtime is available on this thread");
    }

    #[tokio::test]
    async fn test_serial_queue_keeps_submission_order() {
        let queue = assert_ok!(SerialQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let log = log.clone();
            assert_ok!(queue.execute(Box::new(move || log.lock().unwrap().push(i))));
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        assert_ok!(queue.execute(Box::new(move || {
            let _ = tx.send(());
        })));
        rx.await.unwrap();

        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_serial_queue_survives_panicking_job() {
        let queue = assert_ok!(SerialQueue::new());
        assert_ok!(queue.execute(Box::new(|| panic!("boom"))));

        let (tx, rx) = tokio::sync::oneshot::channel();
        assert_ok!(queue.execute(Box::new(move || {
            let _ = tx.send("still running");
        })));
        assert_eq!(rx.await.unwrap(), "still running");
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_after_waits_for_delay() {
        let context = assert_ok!(TokioContext::current());
        let fired = Arc::new(Mutex::new(false));
        {
            let fired = fired.clone();
            assert_ok!(context.execute_after(Duration::from_millis(500), Box::new(move || *fired.lock().unwrap() = true)));
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!*fired.lock().unwrap());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(*fired.lock().unwrap());
    }
}
