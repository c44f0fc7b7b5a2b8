use std::sync::Arc;

use helpers::events::{EmitterWithUnloads, EventEmitter, Unloads};
use helpers_test::{Counter, setup};

#[test]
fn test_component_teardown() {
    setup();

    let emitter = Arc::new(EventEmitter::<u32>::new());
    let emitter_unloads = Unloads::new();
    let bus = EmitterWithUnloads::new(
        Arc::clone(&emitter),
        Some(emitter_unloads.clone()),
        Some("bus"),
    );

    let first = Unloads::new();
    let second = Unloads::new();
    let received = Counter::new();

    for component in [&first, &second] {
        let received = received.clone();
        bus.on(Some(component), "tick", move |_| {
            received.hit();
        });
    }
    let closed = first.push("timer", || {});

    assert_eq!(emitter.emit("tick", &1), 2);
    assert_eq!(emitter_unloads.len(), 2);

    first.run_all();
    assert!(!first.contains(&closed));
    assert_eq!(emitter.listener_count("tick"), 1);
    assert_eq!(emitter_unloads.sources(), [r#"bus.on("tick")"#]);
    assert_eq!(second.len(), 1);

    assert_eq!(emitter.emit("tick", &2), 1);
    assert_eq!(received.get(), 3);

    emitter_unloads.run_all();
    assert!(second.is_empty());
    assert_eq!(emitter.emit("tick", &3), 0);
}

#[test]
fn test_unload_after_emitter_dropped() {
    setup();

    let unloads = Unloads::new();
    let bus = EmitterWithUnloads::new(Arc::new(EventEmitter::<()>::new()), None, None);
    bus.on(Some(&unloads), "event", |_| {});
    drop(bus);

    unloads.run_all();
    assert!(unloads.is_empty());
}
