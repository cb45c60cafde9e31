/*!
 * In-Memory Sink
 * Bounded retention destination for tests and introspection
 */

use crate::core::errors::SinkError;
use crate::core::limits::MEMORY_SINK_CAPACITY;
use crate::core::types::SinkResult;
use crate::track::Trackable;
use crossbeam_queue::ArrayQueue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{EventSink, SinkCore, SinkErrorListener};

/// Concrete sink retaining the last N delivered items in a lock-free ring
pub struct MemorySink {
    core: SinkCore,
    buffer: ArrayQueue<Trackable>,
    opens: AtomicU64,
    closes: AtomicU64,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            core: SinkCore::new("memory"),
            buffer: ArrayQueue::new(capacity.max(1)),
            opens: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        }
    }

    /// Number of retained items
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Remove and return all retained items, oldest first
    pub fn drain(&self) -> Vec<Trackable> {
        let mut out = Vec::with_capacity(self.buffer.len());
        while let Some(item) = self.buffer.pop() {
            out.push(item);
        }
        out
    }

    /// Times the sink transitioned CLOSED → OPEN
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Times the sink transitioned OPEN → CLOSED
    pub fn close_count(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(MEMORY_SINK_CAPACITY)
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn open(&self) -> SinkResult<()> {
        if self.core.mark_open() {
            self.opens.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn close(&self) -> SinkResult<()> {
        if self.core.mark_closed() {
            self.closes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.core.is_open()
    }

    fn log_item(&self, item: Trackable) -> SinkResult<()> {
        if !self.core.is_open() {
            let kind = item.kind();
            return Err(self
                .core
                .fail(SinkError::Closed(self.core.name().into()), kind));
        }
        self.core.stats.count(&item);
        // Retention ring: evict oldest on overflow
        let mut pending = item;
        while let Err(rejected) = self.buffer.push(pending) {
            let _ = self.buffer.pop();
            pending = rejected;
        }
        Ok(())
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
