/*!
 * Tracker
 * Orchestration façade: creates events/activities, enforces the tracking
 * selector, maintains per-thread activity stacks, accumulates usage
 * statistics, and forwards completed items to the event sink chain
 */

pub mod selector;
pub mod stack;
pub mod stats;

pub use selector::{DisabledSelector, LevelSelector, TrackingFilter, TrackingSelector};
pub use stack::{ActivityStack, StackFrame};
pub use stats::TrackerStats;

use crate::core::data_structures::InlineString;
use crate::core::id::{SignatureFactory, UuidFactory};
use crate::core::limits::{
    DEFAULT_EVENT_TTL_SEC, DEFAULT_POOL_NAME, DEFAULT_POOL_WORKERS, DEFAULT_QUEUE_CAPACITY,
};
use crate::core::types::{SinkResult, TrackResult, TtlSec};
use crate::sink::{
    BufferedSink, ConsoleSink, EventSink, FilteredSink, PooledLogger, RateLimiter,
    SinkErrorEvent, SinkErrorListener, SinkFilter, ThrottledSink,
};
use crate::track::{
    OpType, PropertySnapshot, Severity, Source, SourceType, Trackable, TrackingActivity,
    TrackingEvent,
};
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Sink-error listener that implements the tracker's recovery policy:
/// count the error and reset the chain so the next delivery re-opens it
struct ResetOnError {
    stats: Arc<TrackerStats>,
    sink: Weak<dyn EventSink>,
}

impl SinkErrorListener for ResetOnError {
    fn sink_error(&self, event: &SinkErrorEvent) {
        self.stats.errored.fetch_add(1, Ordering::Relaxed);
        if let Some(sink) = self.sink.upgrade() {
            let _ = sink.reset();
        }
        tracing::debug!(
            sink = %event.sink_name,
            error = %event.error,
            kind = event.item_kind,
            "sink error, chain reset"
        );
    }
}

struct TrackerInner {
    name: InlineString,
    source: Source,
    sink: Arc<dyn EventSink>,
    selector: Arc<dyn TrackingSelector>,
    filter: Option<Arc<dyn TrackingFilter>>,
    signatures: Arc<dyn SignatureFactory>,
    keep_context: bool,
    stacks: DashMap<ThreadId, ActivityStack, RandomState>,
    pending_children: DashMap<InlineString, Vec<crate::track::ChildRef>, RandomState>,
    stats: Arc<TrackerStats>,
}

/// One tracker per logical producer context
///
/// Cheap to clone; clones share sink, stacks, and counters.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Tracker with the default console destination
    pub fn new(name: &str) -> Self {
        TrackerConfig::new(name).build()
    }

    /// Tracker writing to an explicit concrete sink
    pub fn with_sink(name: &str, sink: Arc<dyn EventSink>) -> Self {
        TrackerConfig::new(name).with_concrete_sink(sink).build()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[inline]
    pub fn source(&self) -> &Source {
        &self.inner.source
    }

    /// The head of the sink chain this tracker reports through
    pub fn sink(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.inner.sink)
    }

    /// Raw usage counters
    pub fn counters(&self) -> &TrackerStats {
        &self.inner.stats
    }

    // -------------------------------------------------------------------------
    // Item creation
    // -------------------------------------------------------------------------

    /// Create an activity, or the shared no-op variant when the selector
    /// rejects the (severity, name) pair
    pub fn new_activity(&self, severity: Severity, name: &str) -> TrackingActivity {
        let started = Instant::now();
        let activity = if self.inner.selector.is_enabled(severity, name) {
            let signature = self.inner.signatures.new_signature();
            match TrackingActivity::new(name, severity, &signature) {
                Ok(activity) => activity,
                Err(err) => {
                    tracing::warn!(name, error = %err, "signature factory produced an invalid id");
                    TrackingActivity::noop()
                }
            }
        } else {
            TrackingActivity::noop()
        };
        self.inner.stats.add_overhead(started.elapsed());
        activity
    }

    /// Create an activity with a caller-supplied tracking id; invalid ids
    /// fail fast
    pub fn new_activity_signed(
        &self,
        severity: Severity,
        name: &str,
        signature: &str,
    ) -> TrackResult<TrackingActivity> {
        if !self.inner.selector.is_enabled(severity, name) {
            return Ok(TrackingActivity::noop());
        }
        TrackingActivity::new(name, severity, signature)
    }

    /// Create an event, or the no-op variant when the selector rejects it
    pub fn new_event(
        &self,
        severity: Severity,
        op_type: OpType,
        name: &str,
        message: &str,
    ) -> TrackingEvent {
        let started = Instant::now();
        let event = if self.inner.selector.is_enabled(severity, name) {
            let signature = self.inner.signatures.new_signature();
            match TrackingEvent::new(severity, op_type, name, &signature) {
                Ok(mut event) => {
                    if !message.is_empty() {
                        event.set_message(message);
                    }
                    event
                }
                Err(err) => {
                    tracing::warn!(name, error = %err, "signature factory produced an invalid id");
                    TrackingEvent::noop()
                }
            }
        } else {
            TrackingEvent::noop()
        };
        self.inner.stats.add_overhead(started.elapsed());
        event
    }

    /// Create a metric snapshot stamped with this tracker's provenance
    pub fn new_snapshot(&self, category: &str, name: &str) -> PropertySnapshot {
        PropertySnapshot::new(category, name)
    }

    // -------------------------------------------------------------------------
    // Activity stack
    // -------------------------------------------------------------------------

    /// Record an activity entering flight on the calling thread
    ///
    /// If a parent activity is already on top of this thread's stack, the
    /// new activity is linked as its child before being pushed.
    pub fn push(&self, activity: &mut TrackingActivity) {
        if !self.inner.keep_context || activity.is_noop() {
            return;
        }
        let tid = thread::current().id();
        let mut stack = self.inner.stacks.entry(tid).or_default();
        if let Some(top) = stack.top() {
            activity.set_parent_id(top.id.clone());
            self.inner
                .pending_children
                .entry(top.id.clone())
                .or_default()
                .push(activity.child_ref());
        }
        stack.push(StackFrame {
            id: activity.id().into(),
            name: activity.operation().name().into(),
            severity: activity.operation().severity(),
        });
        drop(stack);
        self.inner.stats.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an activity leaving flight, enforcing LIFO discipline
    ///
    /// Children registered while this activity was stacked are drained into
    /// its child list here.
    pub fn pop(&self, activity: &mut TrackingActivity) -> TrackResult<()> {
        if !self.inner.keep_context || activity.is_noop() {
            return Ok(());
        }
        let tid = thread::current().id();
        match self.inner.stacks.get_mut(&tid) {
            None => return Err(crate::core::errors::TrackError::EmptyStack),
            Some(mut stack) => {
                stack.pop(activity.id())?;
                let empty = stack.is_empty();
                drop(stack);
                if empty {
                    self.inner.stacks.remove(&tid);
                }
            }
        }
        if let Some((_, children)) = self.inner.pending_children.remove(activity.id()) {
            activity.extend_children(children);
        }
        self.inner.stats.popped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stack top for the calling thread, or the no-op sentinel frame
    pub fn current_activity(&self) -> StackFrame {
        let tid = thread::current().id();
        self.inner
            .stacks
            .get(&tid)
            .and_then(|s| s.top().cloned())
            .unwrap_or_else(StackFrame::noop)
    }

    /// Stack bottom for the calling thread, or the no-op sentinel frame
    pub fn root_activity(&self) -> StackFrame {
        let tid = thread::current().id();
        self.inner
            .stacks
            .get(&tid)
            .and_then(|s| s.bottom().cloned())
            .unwrap_or_else(StackFrame::noop)
    }

    /// In-flight activity count on the calling thread
    pub fn stack_size(&self) -> usize {
        let tid = thread::current().id();
        self.inner.stacks.get(&tid).map(|s| s.len()).unwrap_or(0)
    }

    /// One frame per stacked activity, innermost first
    pub fn stack_trace(&self) -> Vec<StackFrame> {
        let tid = thread::current().id();
        self.inner
            .stacks
            .get(&tid)
            .map(|s| s.trace())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Reporting
    // -------------------------------------------------------------------------

    /// Report a trackable item
    ///
    /// No-op items only bump the noop counter. Running items are auto-stopped.
    /// Delivery failures are counted and handled through the error path;
    /// they never propagate to the caller.
    pub fn tnt(&self, item: impl Into<Trackable>) {
        let started = Instant::now();
        let mut item = item.into();

        if item.is_noop() {
            self.inner.stats.noops.fetch_add(1, Ordering::Relaxed);
            self.inner.stats.add_overhead(started.elapsed());
            return;
        }

        if let Some(filter) = &self.inner.filter {
            if !filter.accept(&item) {
                self.inner.stats.noops.fetch_add(1, Ordering::Relaxed);
                self.inner.stats.add_overhead(started.elapsed());
                return;
            }
        }

        // Auto-stop anything still running
        match &mut item {
            Trackable::Activity(activity) => {
                if !activity.operation().is_stopped() {
                    let _ = activity.stop(self);
                }
            }
            Trackable::Event(event) => {
                if event.operation().is_started() && !event.operation().is_stopped() {
                    let _ = event.operation_mut().stop();
                }
            }
            _ => {}
        }

        let kind = item.kind();
        match self.deliver(item) {
            Ok(()) => {
                let counter = match kind {
                    "activity" => &self.inner.stats.activities,
                    "event" => &self.inner.stats.events,
                    "snapshot" => &self.inner.stats.snapshots,
                    _ => &self.inner.stats.messages,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.inner.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(tracker = %self.inner.name, error = %err, kind, "report dropped");
            }
        }
        self.inner.stats.add_overhead(started.elapsed());
    }

    /// Log a severity-tagged message through the sink chain
    pub fn log(&self, severity: Severity, text: &str) {
        self.tnt(Trackable::Message {
            severity,
            text: text.to_string(),
        });
    }

    fn deliver(&self, item: Trackable) -> SinkResult<()> {
        let sink = &self.inner.sink;
        if !sink.is_open() {
            sink.open()?;
        }
        sink.log_item(item)
    }

    /// Read-only statistics surface: tracker counters plus the sink chain's
    pub fn stats(&self) -> HashMap<&'static str, i64> {
        let mut out = HashMap::new();
        self.inner.stats.collect(&mut out);
        self.inner.sink.collect_stats(&mut out);
        out
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("name", &self.inner.name.as_str())
            .field("source", &self.inner.source.fqn())
            .field("keep_context", &self.inner.keep_context)
            .finish()
    }
}

/// Tracker assembly configuration
///
/// Builds the sink chain in delivery order:
/// filter → TTL/rate-limit → buffering → concrete destination.
pub struct TrackerConfig {
    name: InlineString,
    source: Source,
    keep_context: bool,
    selector: Arc<dyn TrackingSelector>,
    filter: Option<Arc<dyn TrackingFilter>>,
    signatures: Arc<dyn SignatureFactory>,
    sink: Option<Arc<dyn EventSink>>,
    sink_filters: Vec<Arc<dyn SinkFilter>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    default_ttl: TtlSec,
    buffered: bool,
    block_on_full: bool,
    pool_name: InlineString,
    pool_workers: usize,
    queue_capacity: usize,
}

impl TrackerConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            source: Source::new(SourceType::Appl, name),
            keep_context: true,
            selector: Arc::new(LevelSelector::default()),
            filter: None,
            signatures: Arc::new(UuidFactory),
            sink: None,
            sink_filters: Vec::new(),
            limiter: None,
            default_ttl: DEFAULT_EVENT_TTL_SEC,
            buffered: false,
            block_on_full: false,
            pool_name: InlineString::from(DEFAULT_POOL_NAME),
            pool_workers: DEFAULT_POOL_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Disable per-thread correlation bookkeeping; for embeddings that
    /// propagate context themselves (e.g. pooled-thread runtimes)
    pub fn with_keep_context(mut self, keep: bool) -> Self {
        self.keep_context = keep;
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn TrackingSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn TrackingFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_signatures(mut self, factory: Arc<dyn SignatureFactory>) -> Self {
        self.signatures = factory;
        self
    }

    /// Concrete destination at the end of the chain
    pub fn with_concrete_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_sink_filter(mut self, filter: Arc<dyn SinkFilter>) -> Self {
        self.sink_filters.push(filter);
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_default_ttl(mut self, ttl: TtlSec) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Route delivery through a pooled dispatcher instead of writing
    /// synchronously
    pub fn buffered(mut self, pool_name: &str, workers: usize, capacity: usize) -> Self {
        self.buffered = true;
        self.pool_name = pool_name.into();
        self.pool_workers = workers;
        self.queue_capacity = capacity;
        self
    }

    /// In buffered mode, block producers on a full queue instead of dropping
    pub fn with_blocking(mut self, block: bool) -> Self {
        self.block_on_full = block;
        self
    }

    pub fn build(self) -> Tracker {
        let concrete: Arc<dyn EventSink> =
            self.sink.unwrap_or_else(|| Arc::new(ConsoleSink::new()));

        let mut head: Arc<dyn EventSink> = concrete;
        if self.buffered {
            let pool =
                PooledLogger::named(&self.pool_name, self.pool_workers, self.queue_capacity);
            head = Arc::new(BufferedSink::with_blocking(head, pool, self.block_on_full));
        }
        let head: Arc<dyn EventSink> =
            Arc::new(ThrottledSink::new(head, self.limiter, self.default_ttl));
        let head: Arc<dyn EventSink> = Arc::new(FilteredSink::new(head, self.sink_filters));

        let stats = Arc::new(TrackerStats::new());
        head.add_error_listener(Arc::new(ResetOnError {
            stats: Arc::clone(&stats),
            sink: Arc::downgrade(&head),
        }));

        Tracker {
            inner: Arc::new(TrackerInner {
                name: self.name,
                source: self.source,
                sink: head,
                selector: self.selector,
                filter: self.filter,
                signatures: self.signatures,
                keep_context: self.keep_context,
                stacks: DashMap::with_hasher(RandomState::new()),
                pending_children: DashMap::with_hasher(RandomState::new()),
                stats,
            }),
        }
    }
}
