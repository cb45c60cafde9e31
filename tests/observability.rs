/*!
 * End-to-End Observability Tests
 * Full producer → tracker → sink chain → destination flows
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use trackway::sink::{SinkCore, SinkErrorListener, UNLIMITED};
use trackway::{
    CounterFactory, EventSink, MemorySink, OpType, RateLimiter, Severity, SinkError,
    TokenBucketLimiter, Trackable, TrackerConfig,
};

/// Concrete sink that fails a configured number of writes, then succeeds.
/// Failures notify registered error listeners the way production sinks do.
struct FlakySink {
    core: SinkCore,
    failures_left: AtomicU64,
    delivered: Arc<MemorySink>,
    opens: AtomicU64,
    closes: AtomicU64,
}

impl FlakySink {
    fn new(failures: u64) -> Self {
        let delivered = Arc::new(MemorySink::new(64));
        let _ = delivered.open();
        Self {
            core: SinkCore::new("flaky"),
            failures_left: AtomicU64::new(failures),
            delivered,
            opens: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        }
    }
}

impl EventSink for FlakySink {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn open(&self) -> Result<(), SinkError> {
        if self.core.mark_open() {
            self.opens.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        if self.core.mark_closed() {
            self.closes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.core.is_open()
    }

    fn log_item(&self, item: Trackable) -> Result<(), SinkError> {
        if !self.core.is_open() {
            let kind = item.kind();
            return Err(self
                .core
                .fail(SinkError::Closed(self.core.name().into()), kind));
        }
        let left = self.failures_left.load(Ordering::Acquire);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::Release);
            let kind = item.kind();
            return Err(self.core.fail(
                SinkError::WriteFailed {
                    sink: "flaky".into(),
                    reason: "connection dropped".into(),
                },
                kind,
            ));
        }
        self.delivered.log_item(item)
    }

    fn add_error_listener(&self, listener: Arc<dyn SinkErrorListener>) {
        self.core.listeners.add(listener);
    }

    fn remove_error_listener(&self, listener: &Arc<dyn SinkErrorListener>) {
        self.core.listeners.remove(listener);
    }

    fn collect_stats(&self, out: &mut HashMap<&'static str, i64>) {
        self.core.stats.collect(out);
    }
}

#[test]
fn test_buffered_delivery_preserves_submission_order() {
    // Small (2-slot) buffering sink over a destination that always succeeds;
    // blocking mode applies backpressure so nothing is dropped, and the
    // single worker preserves submission order.
    let sink = Arc::new(MemorySink::new(64));
    let tracker = TrackerConfig::new("ordered")
        .with_concrete_sink(sink.clone())
        .with_signatures(Arc::new(CounterFactory::new("ordered")))
        .buffered("ordered-pool", 1, 2)
        .with_blocking(true)
        .build();

    for n in 0..5 {
        let mut event = tracker.new_event(
            Severity::Info,
            OpType::Event,
            &format!("step-{}", n),
            "payload",
        );
        event.operation_mut().start();
        tracker.tnt(event);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while tracker.stats()["pooled-objects-logged"] < 5 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    let delivered = sink.drain();
    assert_eq!(delivered.len(), 5);
    for (n, item) in delivered.iter().enumerate() {
        match item {
            Trackable::Event(e) => {
                assert_eq!(e.operation().name(), format!("step-{}", n));
            }
            other => panic!("unexpected kind {}", other.kind()),
        }
    }

    let stats = tracker.stats();
    assert_eq!(stats["tracker-events"], 5);
    assert_eq!(stats["pooled-objects-dropped"], 0);
    assert_eq!(stats["pooled-objects-logged"], 5);
}

#[test]
fn test_nested_activities_link_and_unwind() {
    let sink = Arc::new(MemorySink::new(64));
    let tracker = TrackerConfig::new("nested")
        .with_concrete_sink(sink)
        .with_signatures(Arc::new(CounterFactory::new("nested")))
        .build();

    let mut a = tracker.new_activity(Severity::Info, "A");
    a.start(&tracker);
    let mut b = tracker.new_activity(Severity::Info, "B");
    b.start(&tracker);

    assert_eq!(tracker.root_activity().id, a.id());
    assert_eq!(tracker.current_activity().id, b.id());

    b.stop(&tracker).unwrap();
    a.stop(&tracker).unwrap();

    assert!(a.contains_child(b.id()), "B must be listed as a child of A");
    assert_eq!(b.parent_id().unwrap(), a.id());
    assert_eq!(tracker.stack_size(), 0);

    tracker.tnt(b);
    tracker.tnt(a);
    assert_eq!(tracker.counters().activities(), 2);
}

#[test]
fn test_deny_all_limiter_blocks_messages() {
    let sink = Arc::new(MemorySink::new(16));
    let limiter: Arc<dyn RateLimiter> = Arc::new(TokenBucketLimiter::new(0.0, UNLIMITED));
    let tracker = TrackerConfig::new("limited")
        .with_concrete_sink(sink.clone())
        .with_limiter(limiter.clone())
        .build();

    tracker.log(Severity::Info, "x");

    let stats = tracker.stats();
    assert_eq!(stats["sink-messages"], 0, "message must not reach the sink");
    assert_eq!(stats["limiter-total-denied"], 1);
    assert_eq!(sink.len(), 0);
}

#[test]
fn test_sink_error_resets_chain_then_recovers() {
    let flaky = Arc::new(FlakySink::new(1));
    let tracker = TrackerConfig::new("recovering")
        .with_concrete_sink(flaky.clone())
        .with_signatures(Arc::new(CounterFactory::new("recovering")))
        .build();

    // First report: the write fails once, the tracker's error listener
    // counts it and resets the chain (forced close).
    let mut first = tracker.new_event(Severity::Info, OpType::Event, "first", "payload");
    first.operation_mut().start();
    tracker.tnt(first);

    assert_eq!(tracker.counters().errored(), 1);
    assert_eq!(tracker.counters().dropped(), 1);
    assert_eq!(
        flaky.closes.load(Ordering::Relaxed),
        1,
        "reset closed the sink"
    );

    // Second report: the delivery path reopens the chain and succeeds.
    let mut second = tracker.new_event(Severity::Info, OpType::Event, "second", "payload");
    second.operation_mut().start();
    tracker.tnt(second);

    assert_eq!(tracker.counters().events(), 1);
    assert!(
        flaky.opens.load(Ordering::Relaxed) >= 2,
        "closed then reopened"
    );
    let delivered = flaky.delivered.drain();
    assert_eq!(delivered.len(), 1);
    match &delivered[0] {
        Trackable::Event(e) => assert_eq!(e.operation().name(), "second"),
        other => panic!("unexpected kind {}", other.kind()),
    }
}

#[test]
fn test_unreachable_destination_never_blocks_producer() {
    // A destination that always fails: reports are counted as dropped and
    // errored, the producer keeps running.
    let flaky = Arc::new(FlakySink::new(u64::MAX));
    let tracker = TrackerConfig::new("doomed")
        .with_concrete_sink(flaky)
        .with_signatures(Arc::new(CounterFactory::new("doomed")))
        .build();

    let started = Instant::now();
    for n in 0..50 {
        tracker.log(Severity::Warning, &format!("attempt {}", n));
    }
    assert!(started.elapsed() < Duration::from_secs(5));

    let stats = tracker.stats();
    assert_eq!(stats["tracker-dropped"], 50);
    assert_eq!(stats["tracker-errors"], 50);
    assert_eq!(stats["tracker-messages"], 0);
}

#[test]
fn test_snapshot_reporting_through_chain() {
    let sink = Arc::new(MemorySink::new(16));
    let tracker = TrackerConfig::new("snaps")
        .with_concrete_sink(sink.clone())
        .build();

    let mut snap = tracker.new_snapshot("runtime", "heap");
    snap.set_property("used_mb", 512i64);
    tracker.tnt(Trackable::Snapshot(snap));

    assert_eq!(tracker.counters().snapshots(), 1);
    let delivered = sink.drain();
    match &delivered[0] {
        Trackable::Snapshot(s) => {
            assert_eq!(s.id(), "runtime:heap");
            assert!(s.ttl_sec() > 0, "TTL stage assigns the context default");
        }
        other => panic!("unexpected kind {}", other.kind()),
    }
}

#[test]
fn test_send_receive_relation_round_trip() {
    use trackway::{Source, SourceType};

    let sink = Arc::new(MemorySink::new(16));
    let tracker = TrackerConfig::new("relate")
        .with_concrete_sink(sink.clone())
        .with_signatures(Arc::new(CounterFactory::new("relate")))
        .build();

    let mut event = tracker.new_event(Severity::Info, OpType::Send, "order-out", "order 42");
    event.relate(
        Source::new(SourceType::Appl, "orders")
            .with_parent(Source::new(SourceType::Server, "host-a")),
        Source::new(SourceType::Appl, "billing"),
        OpType::Send,
    );
    event.operation_mut().start();
    tracker.tnt(event);

    let delivered = sink.drain();
    match &delivered[0] {
        Trackable::Event(e) => {
            let relation = e.relation().unwrap();
            assert_eq!(relation.from.fqn(), "APPL=orders#SERVER=host-a");
            assert_eq!(relation.to.fqn(), "APPL=billing");
            assert_eq!(relation.kind, OpType::Send);
        }
        other => panic!("unexpected kind {}", other.kind()),
    }
}
