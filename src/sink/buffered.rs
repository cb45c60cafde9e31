/*!
 * Buffering Stage
 * Hands items to a pooled dispatcher instead of writing synchronously
 *
 * A full queue counts a drop rather than blocking the caller; an optional
 * blocking mode applies backpressure instead.
 */

use crate::core::data_structures::InlineString;
use crate::core::types::SinkResult;
use crate::track::Trackable;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::pool::PooledLogger;
use super::{EventSink, SinkErrorListener, SinkLogEvent};

/// Buffering decorator backed by a [`PooledLogger`]
pub struct BufferedSink {
    name: InlineString,
    target: Arc<dyn EventSink>,
    pool: Arc<PooledLogger>,
    open: AtomicBool,
    block: bool,
}

impl BufferedSink {
    pub fn new(target: Arc<dyn EventSink>, pool: Arc<PooledLogger>) -> Self {
        Self::with_blocking(target, pool, false)
    }

    /// `block` selects `put` (backpressure) over `offer` (drop when full)
    pub fn with_blocking(
        target: Arc<dyn EventSink>,
        pool: Arc<PooledLogger>,
        block: bool,
    ) -> Self {
        let mut name = InlineString::from(target.name());
        name.push_str("+buffered");
        Self {
            name,
            target,
            pool,
            open: AtomicBool::new(false),
            block,
        }
    }

    pub fn pool(&self) -> &Arc<PooledLogger> {
        &self.pool
    }
}

impl EventSink for BufferedSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> SinkResult<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> SinkResult<()> {
        self.open.store(false, Ordering::Release);
        self.target.close()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn log_item(&self, item: Trackable) -> SinkResult<()> {
        let event = SinkLogEvent {
            item,
            target: Arc::clone(&self.target),
        };
        if self.block {
            self.pool.put(event)
        } else {
            // A rejected offer was already counted by the pool
            let _ = self.pool.offer(event);
            Ok(())
        }
    }

    fn add_error_listener(&self, listener: Arc<dyn SinkErrorListener>) {
        // Failures surface at the concrete target during worker dispatch
        self.target.add_error_listener(listener);
    }

    fn remove_error_listener(&self, listener: &Arc<dyn SinkErrorListener>) {
        self.target.remove_error_listener(listener);
    }

    fn collect_stats(&self, out: &mut HashMap<&'static str, i64>) {
        self.pool.collect_stats(out);
        self.target.collect_stats(out);
    }
}
