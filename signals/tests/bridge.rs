mod common;
use common::watcher;
use relay_signals::{bridge::*, *};
use std::sync::Arc;
use tokio::time::{Duration, sleep};

#[test]
fn test_property_change_reaches_subscriber() {
    let foo = Property::new(None::<String>);
    let observation = PropertyObservation::new(&foo);
    let signal = Arc::new(ReceiverSignal::<Option<String>>::new());
    let (fired, check) = watcher::<Option<String>>();
    let _subscription = signal.subscribe(fired);

    observation.add(signal.clone());
    foo.set(Some("foo".to_string()));

    assert_eq!(check(), [Some("foo".to_string())]);
}

#[test]
fn test_one_hook_for_many_signals() {
    let property = Property::new(0u16);
    let observation = PropertyObservation::new(&property);
    let signals: Vec<_> = (0..3).map(|_| Arc::new(ReceiverSignal::<u16>::new())).collect();
    for signal in &signals {
        observation.add(signal.clone());
    }
    assert_eq!(property.hook_count(), 1);

    let (fired, check) = watcher::<u16>();
    let _subscription = signals[2].subscribe(fired);

    observation.remove(&signals[0]);
    observation.remove(&signals[1]);
    property.set(9);
    assert_eq!(check(), [9]);

    observation.remove(&signals[2]);
    assert_eq!(property.hook_count(), 0);
    property.set(10);
    assert_eq!(check(), [] as [u16; 0]);
}

#[tokio::test(start_paused = true)]
#[cfg(feature = "tokio")]
async fn test_throttled_property_updates() {
    let position = Property::new(0i32);
    let observation = PropertyObservation::new(&position);
    let signal = Arc::new(ReceiverSignal::<i32>::new());
    let (fired, check) = watcher::<i32>();
    let _subscription = signal.subscribe(fired).sample(Duration::from_millis(100));
    observation.add(signal.clone());

    for x in 1..=50 {
        position.set(x);
    }
    sleep(Duration::from_millis(500)).await;

    assert_eq!(check(), [1, 50]);
}
