use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tracing::{debug, trace};

use crate::{DispatchError, ExecutionContext, context::Job};

/// Leading+trailing throttle owned by a single subscription.
///
/// The first value of a quiet period is emitted at once and opens a cooldown of `interval`.
/// A value arriving during the cooldown is buffered and emitted `interval` after it arrived,
/// replaced by anything newer that shows up in the meantime. Immediate emission resumes once a
/// full interval passes with nothing buffered.
pub(crate) struct Sampler<T> {
    state: Mutex<State<T>>,
    emit: Box<dyn Fn(T) + Send + Sync + 'static>,
}

struct State<T> {
    interval: Duration,
    pending: Option<T>,
    ready_for_immediate_emit: bool,
    context: Option<Arc<dyn ExecutionContext>>,
    // runtime seen when the throttle was configured, used when no context is set
    fallback_timer: Option<Arc<dyn ExecutionContext>>,
}

enum Step<T> {
    EmitNow(T),
    Replaced,
    ScheduleTrailing,
}

impl<T> Sampler<T>
where T: Send + 'static
{
    /// Captures the calling thread's runtime (if any) as the timer to fall back on, so values
    /// fired later from threads outside that runtime are still throttled.
    pub(crate) fn new<F>(emit: F, context: Option<Arc<dyn ExecutionContext>>) -> Arc<Self>
    where F: Fn(T) + Send + Sync + 'static {
        let fallback_timer = default_timer().ok();
        Arc::new(Self {
            state: Mutex::new(State { interval: Duration::ZERO, pending: None, ready_for_immediate_emit: true, context, fallback_timer }),
            emit: Box::new(emit),
        })
    }

    pub(crate) fn set_interval(&self, interval: Duration) { self.state().interval = interval; }

    pub(crate) fn set_context(&self, context: Option<Arc<dyn ExecutionContext>>) { self.state().context = context; }

    pub(crate) fn enqueue(self: &Arc<Self>, value: T) {
        let step = {
            let mut state = self.state();
            if state.pending.is_none() && state.ready_for_immediate_emit {
                state.ready_for_immediate_emit = false;
                Step::EmitNow(value)
            } else if state.pending.is_some() {
                state.pending = Some(value);
                Step::Replaced
            } else {
                state.pending = Some(value);
                Step::ScheduleTrailing
            }
        };

        match step {
            Step::EmitNow(value) => {
                trace!("sampler emitting on the leading edge");
                // scheduled first so a panicking handler cannot leave the window shut
                self.after(Self::reopen);
                (self.emit)(value);
            }
            Step::Replaced => trace!("sampler replaced its buffered value"),
            Step::ScheduleTrailing => {
                trace!("sampler buffering for the trailing edge");
                self.after(Self::emit_pending);
            }
        }
    }

    fn reopen(self: &Arc<Self>) {
        let mut state = self.state();
        if state.pending.is_none() {
            state.ready_for_immediate_emit = true;
        }
    }

    fn emit_pending(self: &Arc<Self>) {
        let value = {
            let mut state = self.state();
            let Some(value) = state.pending.take() else { return };
            state.ready_for_immediate_emit = false;
            value
        };
        trace!("sampler emitting on the trailing edge");
        self.after(Self::reopen);
        (self.emit)(value);
    }

    /// Run `callback` one interval from now, on the configured context, else the runtime captured
    /// at creation, else the caller's runtime. With no runtime anywhere it runs right away, which
    /// turns the throttle into a pass-through instead of stranding a buffered value.
    fn after(self: &Arc<Self>, callback: fn(&Arc<Self>)) {
        let (interval, context) = {
            let state = self.state();
            (state.interval, state.context.clone().or_else(|| state.fallback_timer.clone()))
        };

        let sampler = Arc::downgrade(self);
        let job: Job = Box::new(move || {
            if let Some(sampler) = sampler.upgrade() {
                callback(&sampler)
            }
        });

        let scheduled = context.map_or_else(default_timer, Ok).and_then(move |context| context.execute_after(interval, job));
        if let Err(error) = scheduled {
            debug!("sampler timer unavailable ({error}), running callback now");
            callback(self);
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> { self.state.lock().expect("sampler state lock is poisoned") }
}

#[cfg(feature = "tokio")]
fn default_timer() -> Result<Arc<dyn ExecutionContext>, DispatchError> {
    crate::TokioContext::current().map(|context| Arc::new(context) as Arc<dyn ExecutionContext>)
}

#[cfg(not(feature = "tokio"))]
fn default_timer() -> Result<Arc<dyn ExecutionContext>, DispatchError> { Err(DispatchError::NoRuntime) }
