/*!
 * Pooled Dispatcher
 * Bounded queue plus a fixed worker pool decoupling producers from slow or
 * failing destinations
 *
 * Workers run a blocking take-dispatch loop. Dispatch failures are counted
 * and never kill a worker; the worker enters a soft error state and counts a
 * recovery when the next dispatch succeeds. Diagnostic error logging is
 * rate-limited to avoid log storms during sustained outages.
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::SinkError;
use crate::core::limits::{ERROR_REPORT_INTERVAL, POOL_POLL_INTERVAL, SHUTDOWN_GRACE_PERIOD};
use crate::core::types::SinkResult;
use crate::track::Trackable;
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::SinkLogEvent;

struct PoolInner {
    name: InlineString,
    capacity: usize,
    worker_count: usize,
    tx: flume::Sender<SinkLogEvent>,
    rx: flume::Receiver<SinkLogEvent>,
    stopping: AtomicBool,
    exited: AtomicUsize,
    exit_lock: Mutex<()>,
    exit_cv: Condvar,
    dropped: AtomicU64,
    delivered: AtomicU64,
    exceptions: AtomicU64,
    recoveries: AtomicU64,
    dispatch_nanos: AtomicU64,
    last_error_report: Mutex<Option<Instant>>,
}

impl PoolInner {
    fn dispatch(&self, event: SinkLogEvent, in_error: &mut bool) {
        let started = Instant::now();
        let result = (|| {
            if !event.target.is_open() {
                event.target.open()?;
            }
            match event.item {
                Trackable::Activity(activity) => event.target.log_activity(activity),
                Trackable::Event(ev) => event.target.log_event(ev),
                Trackable::Snapshot(snapshot) => event.target.log_snapshot(snapshot),
                Trackable::Message { severity, text } => {
                    event.target.log_message(severity, &text)
                }
            }
        })();
        self.dispatch_nanos
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);

        match result {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                if *in_error {
                    *in_error = false;
                    self.recoveries.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(err) => {
                self.exceptions.fetch_add(1, Ordering::Relaxed);
                *in_error = true;
                self.report_error(&err);
            }
        }
    }

    /// Rate-limited diagnostic reporting for dispatch failures
    fn report_error(&self, err: &SinkError) {
        let mut last = self.last_error_report.lock();
        let due = last
            .map(|at| at.elapsed() >= ERROR_REPORT_INTERVAL)
            .unwrap_or(true);
        if due {
            *last = Some(Instant::now());
            drop(last);
            tracing::error!(
                pool = %self.name,
                error = %err,
                exceptions = self.exceptions.load(Ordering::Relaxed),
                "sink dispatch failed"
            );
        }
    }

    fn worker_loop(self: Arc<Self>) {
        let mut in_error = false;
        loop {
            match self.rx.recv_timeout(POOL_POLL_INTERVAL) {
                Ok(event) => self.dispatch(event, &mut in_error),
                Err(flume::RecvTimeoutError::Timeout) => {
                    if self.stopping.load(Ordering::Acquire) {
                        // Drain whatever is left, then exit
                        while let Ok(event) = self.rx.try_recv() {
                            self.dispatch(event, &mut in_error);
                        }
                        break;
                    }
                }
                Err(flume::RecvTimeoutError::Disconnected) => break,
            }
        }
        self.exited.fetch_add(1, Ordering::AcqRel);
        let _guard = self.exit_lock.lock();
        self.exit_cv.notify_all();
    }
}

/// Bounded-queue worker-pool dispatcher
///
/// `offer` never blocks (full queue counts a drop); `put` applies
/// backpressure to callers that accept it.
pub struct PooledLogger {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PooledLogger {
    pub fn new(name: &str, worker_count: usize, capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let capacity = capacity.max(1);
        let (tx, rx) = flume::bounded(capacity);
        let inner = Arc::new(PoolInner {
            name: name.into(),
            capacity,
            worker_count,
            tx,
            rx,
            stopping: AtomicBool::new(false),
            exited: AtomicUsize::new(0),
            exit_lock: Mutex::new(()),
            exit_cv: Condvar::new(),
            dropped: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            exceptions: AtomicU64::new(0),
            recoveries: AtomicU64::new(0),
            dispatch_nanos: AtomicU64::new(0),
            last_error_report: Mutex::new(None),
        });

        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let worker = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("trackway-pool-{}-{}", name, i))
                .spawn(move || worker.worker_loop())
                .expect("failed to spawn pool worker");
            handles.push(handle);
        }

        Self {
            inner,
            workers: Mutex::new(handles),
        }
    }

    /// Fetch or create the shared pool registered under `name`
    ///
    /// All buffering sinks created under one pool name share the same queue
    /// and workers. Sizing is fixed by the first creation.
    pub fn named(name: &str, worker_count: usize, capacity: usize) -> Arc<PooledLogger> {
        static POOLS: OnceLock<DashMap<InlineString, Arc<PooledLogger>, RandomState>> =
            OnceLock::new();
        let pools = POOLS.get_or_init(|| DashMap::with_hasher(RandomState::new()));

        let pool = pools
            .entry(name.into())
            .or_insert_with(|| Arc::new(PooledLogger::new(name, worker_count, capacity)))
            .clone();
        if pool.capacity() != capacity.max(1) || pool.worker_count() != worker_count.max(1) {
            log::debug!(
                "pool '{}' reused with existing sizing ({} workers, capacity {})",
                name,
                pool.worker_count(),
                pool.capacity()
            );
        }
        pool
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Non-blocking enqueue; a full or stopped queue counts a drop
    pub fn offer(&self, event: SinkLogEvent) -> bool {
        if self.inner.stopping.load(Ordering::Acquire) {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        match self.inner.tx.try_send(event) {
            Ok(()) => true,
            Err(_) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Blocking enqueue for callers that accept backpressure
    pub fn put(&self, event: SinkLogEvent) -> SinkResult<()> {
        if self.inner.stopping.load(Ordering::Acquire) {
            return Err(SinkError::Shutdown(self.inner.name.clone()));
        }
        self.inner
            .tx
            .send(event)
            .map_err(|_| SinkError::Shutdown(self.inner.name.clone()))
    }

    /// Stop intake, signal workers, wait up to `grace` for drain, then
    /// abandon any straggler still stuck in a write
    pub fn shutdown(&self, grace: Duration) {
        if self.inner.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        let deadline = Instant::now() + grace;
        {
            let mut guard = self.inner.exit_lock.lock();
            while self.inner.exited.load(Ordering::Acquire) < self.inner.worker_count {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                self.inner.exit_cv.wait_for(&mut guard, deadline - now);
            }
        }

        let mut handles = self.workers.lock();
        if self.inner.exited.load(Ordering::Acquire) == self.inner.worker_count {
            for handle in handles.drain(..) {
                let _ = handle.join();
            }
        } else {
            tracing::warn!(
                pool = %self.inner.name,
                "abandoning workers still busy after shutdown grace period"
            );
            handles.clear();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.stopping.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    #[inline]
    pub fn queue_size(&self) -> usize {
        self.inner.rx.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    pub fn exceptions(&self) -> u64 {
        self.inner.exceptions.load(Ordering::Relaxed)
    }

    pub fn recoveries(&self) -> u64 {
        self.inner.recoveries.load(Ordering::Relaxed)
    }

    pub fn dispatch_nanos(&self) -> u64 {
        self.inner.dispatch_nanos.load(Ordering::Relaxed)
    }

    pub fn collect_stats(&self, out: &mut HashMap<&'static str, i64>) {
        *out.entry("pooled-queue-size").or_insert(0) += self.queue_size() as i64;
        *out.entry("pooled-queue-capacity").or_insert(0) += self.capacity() as i64;
        *out.entry("pooled-objects-dropped").or_insert(0) += self.dropped() as i64;
        *out.entry("pooled-objects-logged").or_insert(0) += self.delivered() as i64;
        *out.entry("pooled-exceptions").or_insert(0) += self.exceptions() as i64;
        *out.entry("pooled-recovery-count").or_insert(0) += self.recoveries() as i64;
    }
}

impl Drop for PooledLogger {
    fn drop(&mut self) {
        self.shutdown(SHUTDOWN_GRACE_PERIOD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{EventSink, MemorySink};
    use crate::track::{PropertySnapshot, Severity, Trackable};
    use std::time::Duration;

    fn item(n: usize) -> Trackable {
        Trackable::Snapshot(
            PropertySnapshot::new("test", &format!("snap-{}", n)).with_severity(Severity::Info),
        )
    }

    fn wait_for(pool: &PooledLogger, delivered: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.delivered() < delivered && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_offer_and_dispatch() {
        let pool = PooledLogger::new("t-dispatch", 2, 64);
        let sink = Arc::new(MemorySink::new(64));
        sink.open().unwrap();

        for n in 0..5 {
            assert!(pool.offer(SinkLogEvent {
                item: item(n),
                target: sink.clone(),
            }));
        }
        wait_for(&pool, 5);
        assert_eq!(pool.delivered(), 5);
        assert_eq!(sink.len(), 5);
        pool.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn test_put_blocking_delivers() {
        let pool = PooledLogger::new("t-put", 1, 2);
        let sink = Arc::new(MemorySink::new(64));
        sink.open().unwrap();

        for n in 0..10 {
            pool.put(SinkLogEvent {
                item: item(n),
                target: sink.clone(),
            })
            .unwrap();
        }
        wait_for(&pool, 10);
        assert_eq!(pool.delivered(), 10);
        assert_eq!(pool.dropped(), 0);
        pool.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn test_shutdown_rejects_new_work() {
        let pool = PooledLogger::new("t-shutdown", 1, 4);
        let sink = Arc::new(MemorySink::new(16));
        sink.open().unwrap();

        pool.shutdown(Duration::from_secs(2));
        assert!(pool.is_shut_down());
        assert!(!pool.offer(SinkLogEvent {
            item: item(0),
            target: sink.clone(),
        }));
        assert!(pool.put(SinkLogEvent {
            item: item(1),
            target: sink,
        })
        .is_err());
        assert_eq!(pool.dropped(), 1);
    }

    #[test]
    fn test_dispatch_opens_closed_target() {
        let pool = PooledLogger::new("t-reopen", 1, 8);
        let sink = Arc::new(MemorySink::new(16));
        // Never opened by the producer; the worker opens on demand
        assert!(!sink.is_open());

        pool.offer(SinkLogEvent {
            item: item(0),
            target: sink.clone(),
        });
        wait_for(&pool, 1);
        assert!(sink.is_open());
        assert_eq!(sink.len(), 1);
        pool.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn test_stats_keys() {
        let pool = PooledLogger::new("t-stats", 1, 32);
        let mut out = HashMap::new();
        pool.collect_stats(&mut out);
        assert_eq!(out["pooled-queue-capacity"], 32);
        assert_eq!(out["pooled-objects-logged"], 0);
        pool.shutdown(Duration::from_secs(2));
    }
}
