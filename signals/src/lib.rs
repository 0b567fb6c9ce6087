/*!
Typed in-process signals with per-subscriber dispatch policies.

A [`Signal`] broadcasts values to its [`Subscription`]s in the order they subscribed. Each
subscription carries its own policy:
- `filter` drops values before they go anywhere
- `sample` throttles to at most one delivery per interval, leading edge immediate and
  trailing edge carrying the latest value
- `queue` moves handler and dispose calls onto an [`ExecutionContext`]
- `with` ties the subscription to the lifetime of some owner
- `dispose` runs once when the subscription is canceled

# Basic usage

```rust
use relay_signals::*;

let signal = Signal::<u32>::new();
let subscription = signal
    .subscribe(|value: u32| println!("got {value}"))
    .filter(|value| *value > 10)
    .dispose(|| println!("done"));

signal.fire(5); // filtered
signal.fire(42); // got 42
subscription.cancel(); // done
signal.fire(43); // nothing
```

# Throttling

```rust,no_run
use relay_signals::*;
use std::time::Duration;

# async fn example() -> Result<(), DispatchError> {
let signal = Signal::<(f32, f32)>::new();
let _subscription = signal
    .subscribe(|position: (f32, f32)| println!("moved to {position:?}"))
    .queue(SerialQueue::new()?)
    .sample(Duration::from_millis(100));

for x in 0..1000 {
    signal.fire((x as f32, 0.0)); // at most ten deliveries a second
}
# Ok(())
# }
```
*/

pub mod bridge;
mod context;
mod error;
mod handler;
mod liveness;
mod sampler;
mod signal;
mod subscription;

pub use context::*;
pub use error::DispatchError;
pub use handler::*;
pub use liveness::*;
pub use signal::*;
pub use subscription::*;
