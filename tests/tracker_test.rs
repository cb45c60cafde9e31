/*!
 * Tracker Correlation Engine Tests
 */

use std::sync::Arc;
use trackway::{
    CounterFactory, LevelSelector, MemorySink, Severity, Trackable, Tracker, TrackerConfig,
};

fn memory_tracker(name: &str) -> (Tracker, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new(128));
    let tracker = TrackerConfig::new(name)
        .with_concrete_sink(sink.clone())
        .with_signatures(Arc::new(CounterFactory::new(name)))
        .build();
    (tracker, sink)
}

#[test]
fn test_stack_discipline_lifo() {
    let (tracker, _sink) = memory_tracker("lifo");

    let mut a = tracker.new_activity(Severity::Info, "a");
    a.start(&tracker);
    let mut b = tracker.new_activity(Severity::Info, "b");
    b.start(&tracker);
    let mut c = tracker.new_activity(Severity::Info, "c");
    c.start(&tracker);

    assert_eq!(tracker.current_activity().id, c.id());
    assert_eq!(tracker.stack_size(), 3);

    c.stop(&tracker).unwrap();
    assert_eq!(tracker.current_activity().id, b.id());
    b.stop(&tracker).unwrap();
    a.stop(&tracker).unwrap();

    assert!(tracker.current_activity().is_noop());
    assert_eq!(tracker.counters().pushed(), 3);
    assert_eq!(tracker.counters().popped(), 3);
}

#[test]
fn test_pop_non_top_is_a_programming_error() {
    let (tracker, _sink) = memory_tracker("viol");

    let mut a = tracker.new_activity(Severity::Info, "a");
    a.start(&tracker);
    let mut b = tracker.new_activity(Severity::Info, "b");
    b.start(&tracker);

    // Stopping the outer activity while the inner one is in flight violates
    // stack discipline and surfaces synchronously.
    assert!(a.stop(&tracker).is_err());
}

#[test]
fn test_stack_trace_synthesis() {
    let (tracker, _sink) = memory_tracker("trace");

    let mut outer = tracker.new_activity(Severity::Info, "request");
    outer.start(&tracker);
    let mut inner = tracker.new_activity(Severity::Info, "db-call");
    inner.start(&tracker);

    let frames = tracker.stack_trace();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].name, "db-call");
    assert_eq!(frames[1].name, "request");
    let rendered = format!("{}", frames[0]);
    assert!(rendered.contains("db-call"));
    assert!(rendered.contains(inner.id()));

    inner.stop(&tracker).unwrap();
    outer.stop(&tracker).unwrap();
}

#[test]
fn test_stacks_are_thread_scoped() {
    let (tracker, _sink) = memory_tracker("threads");

    let mut main_act = tracker.new_activity(Severity::Info, "main-work");
    main_act.start(&tracker);

    let other = {
        let tracker = tracker.clone();
        std::thread::spawn(move || {
            // The spawned thread sees its own, initially empty, stack
            assert_eq!(tracker.stack_size(), 0);
            let mut act = tracker.new_activity(Severity::Info, "worker-job");
            act.start(&tracker);
            assert_eq!(tracker.stack_size(), 1);
            act.stop(&tracker).unwrap();
            tracker.stack_size()
        })
    };
    assert_eq!(other.join().unwrap(), 0);

    // Main thread's stack was untouched by the worker
    assert_eq!(tracker.stack_size(), 1);
    main_act.stop(&tracker).unwrap();
}

#[test]
fn test_selector_disables_with_noop() {
    let sink = Arc::new(MemorySink::new(16));
    let tracker = TrackerConfig::new("selective")
        .with_concrete_sink(sink.clone())
        .with_selector(Arc::new(LevelSelector::new(Severity::Error)))
        .build();

    let mut quiet = tracker.new_activity(Severity::Debug, "quiet");
    assert!(quiet.is_noop());

    // Noop activities are stack-transparent and never reported
    quiet.start(&tracker);
    assert_eq!(tracker.stack_size(), 0);
    quiet.stop(&tracker).unwrap();
    tracker.tnt(quiet);

    assert_eq!(tracker.counters().noops(), 1);
    assert_eq!(tracker.counters().activities(), 0);
    assert_eq!(sink.len(), 0);
}

#[test]
fn test_report_delivers_events() {
    let (tracker, sink) = memory_tracker("deliver");

    let mut event = tracker.new_event(
        Severity::Info,
        trackway::OpType::Event,
        "cache-miss",
        "key=user:42",
    );
    event.operation_mut().start();
    tracker.tnt(event);

    assert_eq!(tracker.counters().events(), 1);
    let delivered = sink.drain();
    assert_eq!(delivered.len(), 1);
    match &delivered[0] {
        Trackable::Event(e) => {
            assert_eq!(e.operation().name(), "cache-miss");
            assert!(e.operation().is_stopped(), "reporting auto-stops");
        }
        other => panic!("unexpected kind {}", other.kind()),
    }
}

#[test]
fn test_counter_signatures_are_deterministic() {
    let (tracker, _sink) = memory_tracker("sig");
    let a = tracker.new_activity(Severity::Info, "first");
    let b = tracker.new_activity(Severity::Info, "second");
    assert_eq!(a.id(), "sig-1");
    assert_eq!(b.id(), "sig-2");
}
