/*!
 * Event Sinks
 * Uniform delivery contract plus the decorator chain:
 * filter → TTL/rate-limit → buffering → concrete destination
 */

pub mod buffered;
pub mod console;
pub mod filter;
pub mod limiter;
pub mod memory;
pub mod pool;

pub use buffered::BufferedSink;
pub use console::ConsoleSink;
pub use filter::{FilteredSink, LevelFilter, SinkFilter};
pub use limiter::{RateLimiter, ThrottledSink, TokenBucketLimiter, UNLIMITED};
pub use memory::MemorySink;
pub use pool::PooledLogger;

use crate::core::data_structures::InlineString;
use crate::core::errors::SinkError;
use crate::core::types::SinkResult;
use crate::track::{PropertySnapshot, Severity, Trackable, TrackingActivity, TrackingEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Delivery failure notification passed to sink-error listeners
#[derive(Debug, Clone)]
pub struct SinkErrorEvent {
    pub sink_name: InlineString,
    pub error: SinkError,
    pub item_kind: &'static str,
}

/// Observer of delivery failures
pub trait SinkErrorListener: Send + Sync {
    fn sink_error(&self, event: &SinkErrorEvent);
}

/// Registered error listeners
///
/// Registration is mutex-guarded; notification iterates a snapshot so user
/// callbacks never run under the lock.
#[derive(Clone, Default)]
pub struct ErrorListeners {
    inner: Arc<Mutex<Vec<Arc<dyn SinkErrorListener>>>>,
}

impl ErrorListeners {
    pub fn add(&self, listener: Arc<dyn SinkErrorListener>) {
        self.inner.lock().push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn SinkErrorListener>) {
        self.inner.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn notify(&self, event: &SinkErrorEvent) {
        let snapshot = self.inner.lock().clone();
        for listener in snapshot {
            listener.sink_error(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl fmt::Debug for ErrorListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorListeners({})", self.len())
    }
}

/// Per-sink delivery counters
#[derive(Debug, Default)]
pub struct SinkStats {
    pub events: AtomicU64,
    pub activities: AtomicU64,
    pub snapshots: AtomicU64,
    pub messages: AtomicU64,
    pub errors: AtomicU64,
}

impl SinkStats {
    /// Count one delivered item by kind
    pub fn count(&self, item: &Trackable) {
        let counter = match item {
            Trackable::Event(_) => &self.events,
            Trackable::Activity(_) => &self.activities,
            Trackable::Snapshot(_) => &self.snapshots,
            Trackable::Message { .. } => &self.messages,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn collect(&self, out: &mut HashMap<&'static str, i64>) {
        *out.entry("sink-events").or_insert(0) += self.events.load(Ordering::Relaxed) as i64;
        *out.entry("sink-activities").or_insert(0) +=
            self.activities.load(Ordering::Relaxed) as i64;
        *out.entry("sink-snapshots").or_insert(0) += self.snapshots.load(Ordering::Relaxed) as i64;
        *out.entry("sink-messages").or_insert(0) += self.messages.load(Ordering::Relaxed) as i64;
        *out.entry("sink-errors").or_insert(0) += self.errors.load(Ordering::Relaxed) as i64;
    }
}

/// Shared state for concrete sinks: open flag, counters, error listeners
#[derive(Debug)]
pub struct SinkCore {
    name: InlineString,
    open: AtomicBool,
    pub stats: SinkStats,
    pub listeners: ErrorListeners,
}

impl SinkCore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            open: AtomicBool::new(false),
            stats: SinkStats::default(),
            listeners: ErrorListeners::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Mark open; returns true on the CLOSED → OPEN transition
    pub fn mark_open(&self) -> bool {
        !self.open.swap(true, Ordering::AcqRel)
    }

    /// Mark closed; returns true on the OPEN → CLOSED transition
    pub fn mark_closed(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }

    /// Record a delivery failure: count it, notify listeners, hand the error back
    pub fn fail(&self, error: SinkError, item_kind: &'static str) -> SinkError {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        self.listeners.notify(&SinkErrorEvent {
            sink_name: self.name.clone(),
            error: error.clone(),
            item_kind,
        });
        error
    }
}

/// Uniform sink contract
///
/// Decorator layers and concrete destinations all implement this trait, so
/// stages compose transparently. State machine per sink:
/// `CLOSED → OPEN` via idempotent `open()`, back via idempotent `close()`.
/// Logging while closed fails fast with [`SinkError::Closed`]; the report
/// path and the pool workers reopen on demand after a reset.
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self) -> SinkResult<()>;

    fn close(&self) -> SinkResult<()>;

    fn is_open(&self) -> bool;

    /// Force a close so the next delivery attempt re-opens the sink
    fn reset(&self) -> SinkResult<()> {
        self.close()
    }

    /// Deliver one trackable item
    fn log_item(&self, item: Trackable) -> SinkResult<()>;

    fn log_event(&self, event: TrackingEvent) -> SinkResult<()> {
        self.log_item(Trackable::Event(event))
    }

    fn log_activity(&self, activity: TrackingActivity) -> SinkResult<()> {
        self.log_item(Trackable::Activity(activity))
    }

    fn log_snapshot(&self, snapshot: PropertySnapshot) -> SinkResult<()> {
        self.log_item(Trackable::Snapshot(snapshot))
    }

    fn log_message(&self, severity: Severity, text: &str) -> SinkResult<()> {
        self.log_item(Trackable::Message {
            severity,
            text: text.to_string(),
        })
    }

    fn add_error_listener(&self, listener: Arc<dyn SinkErrorListener>);

    fn remove_error_listener(&self, listener: &Arc<dyn SinkErrorListener>);

    /// Merge this sink's statistics (and its inner chain's) into `out`
    fn collect_stats(&self, out: &mut HashMap<&'static str, i64>);
}

/// One queued unit of asynchronous delivery work
///
/// Short-lived: created at the buffering stage, consumed by a pool worker,
/// not retained after dispatch.
pub struct SinkLogEvent {
    pub item: Trackable,
    pub target: Arc<dyn EventSink>,
}

impl fmt::Debug for SinkLogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkLogEvent")
            .field("kind", &self.item.kind())
            .field("target", &self.target.name())
            .finish()
    }
}
