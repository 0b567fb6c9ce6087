use relay_signals::Handler;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[allow(unused)]
pub fn init_tracing() { let _ = tracing_subscriber::fmt().with_test_writer().try_init(); }

/// A shareable handler that records every delivered value, paired with a closure that drains
/// what has been recorded so far
#[allow(unused)]
pub fn watcher<T: Send + 'static>() -> (Handler<T>, impl Fn() -> Vec<T> + Send + Sync) {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let handler: Handler<T> = {
        let delivered = delivered.clone();
        Arc::new(move |value: T| delivered.lock().unwrap().push(value))
    };
    (handler, move || std::mem::take(&mut *delivered.lock().unwrap()))
}

/// Like `watcher`, but records when each value arrived, in milliseconds since `start`
/// rounded to the nearest 10ms
#[allow(unused)]
pub fn timed_watcher<T: Send + 'static>(start: Instant) -> (Handler<T>, impl Fn() -> Vec<(T, u64)> + Send + Sync) {
    let (record, check) = watcher::<(T, u64)>();
    let handler: Handler<T> = Arc::new(move |value: T| {
        let millis = start.elapsed().as_millis() as u64;
        record((value, (millis + 5) / 10 * 10))
    });
    (handler, check)
}
