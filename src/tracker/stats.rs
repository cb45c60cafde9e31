/*!
 * Tracker Statistics
 * Atomic usage counters with a stable key/value surface
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-tracker usage counters
///
/// All counters are atomics updated with relaxed ordering; readers get a
/// consistent-enough snapshot for monitoring purposes.
#[derive(Debug, Default)]
pub struct TrackerStats {
    pub activities: AtomicU64,
    pub events: AtomicU64,
    pub snapshots: AtomicU64,
    pub messages: AtomicU64,
    pub noops: AtomicU64,
    pub dropped: AtomicU64,
    pub errored: AtomicU64,
    pub pushed: AtomicU64,
    pub popped: AtomicU64,
    pub overhead_nanos: AtomicU64,
}

impl TrackerStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_overhead(&self, elapsed: Duration) {
        self.overhead_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn activities(&self) -> u64 {
        self.activities.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn noops(&self) -> u64 {
        self.noops.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn errored(&self) -> u64 {
        self.errored.load(Ordering::Relaxed)
    }

    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }

    pub fn overhead_nanos(&self) -> u64 {
        self.overhead_nanos.load(Ordering::Relaxed)
    }

    pub fn collect(&self, out: &mut HashMap<&'static str, i64>) {
        out.insert("tracker-activities", self.activities() as i64);
        out.insert("tracker-events", self.events() as i64);
        out.insert("tracker-snapshots", self.snapshots() as i64);
        out.insert("tracker-messages", self.messages() as i64);
        out.insert("tracker-noops", self.noops() as i64);
        out.insert("tracker-dropped", self.dropped() as i64);
        out.insert("tracker-errors", self.errored() as i64);
        out.insert("tracker-pushed", self.pushed() as i64);
        out.insert("tracker-popped", self.popped() as i64);
        out.insert("tracker-overhead-nanos", self.overhead_nanos() as i64);
    }
}
