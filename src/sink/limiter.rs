/*!
 * TTL and Rate-Limit Stage
 * Assigns context-default TTLs and gates delivery through a pluggable limiter
 */

use crate::core::data_structures::InlineString;
use crate::core::limits::LIMITER_MAX_SLEEP;
use crate::core::types::{SinkResult, TtlSec, TTL_CONTEXT};
use crate::track::Trackable;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{EventSink, SinkErrorListener};

/// Rate of `f64::INFINITY` places no limit on that dimension
pub const UNLIMITED: f64 = f64::INFINITY;

/// Pluggable backpressure policy
///
/// `obtain` is consulted once per item with its message and byte counts; a
/// denial means the item is dropped without forwarding.
pub trait RateLimiter: Send + Sync {
    fn obtain(&self, msg_count: u64, byte_count: u64) -> bool;

    fn denied(&self) -> u64;

    fn delayed(&self) -> u64;

    fn total_msgs(&self) -> u64;

    fn total_bytes(&self) -> u64;
}

struct BucketState {
    msgs: f64,
    bytes: f64,
    last_refill: Instant,
}

/// Token-bucket limiter over messages/sec and bytes/sec
///
/// A non-positive rate denies every request on that dimension. In blocking
/// mode a short bounded sleep is taken to satisfy a request instead of
/// denying it, counted as a delay.
pub struct TokenBucketLimiter {
    max_mps: f64,
    max_bps: f64,
    block: bool,
    state: Mutex<BucketState>,
    denied: AtomicU64,
    delayed: AtomicU64,
    total_msgs: AtomicU64,
    total_bytes: AtomicU64,
}

impl TokenBucketLimiter {
    pub fn new(max_mps: f64, max_bps: f64) -> Self {
        Self::with_blocking(max_mps, max_bps, false)
    }

    pub fn with_blocking(max_mps: f64, max_bps: f64, block: bool) -> Self {
        Self {
            max_mps,
            max_bps,
            block,
            state: Mutex::new(BucketState {
                // Buckets start full so a quiet system admits an initial burst
                msgs: max_mps.max(0.0),
                bytes: max_bps.max(0.0),
                last_refill: Instant::now(),
            }),
            denied: AtomicU64::new(0),
            delayed: AtomicU64::new(0),
            total_msgs: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let dt = state.last_refill.elapsed().as_secs_f64();
        state.last_refill = Instant::now();
        if self.max_mps.is_finite() {
            state.msgs = (state.msgs + dt * self.max_mps).min(self.max_mps);
        } else {
            state.msgs = f64::INFINITY;
        }
        if self.max_bps.is_finite() {
            state.bytes = (state.bytes + dt * self.max_bps).min(self.max_bps);
        } else {
            state.bytes = f64::INFINITY;
        }
    }

    /// Seconds until the deficit refills, infinite for a dead dimension
    fn wait_needed(&self, state: &BucketState, mc: f64, bc: f64) -> f64 {
        let msg_wait = if state.msgs >= mc {
            0.0
        } else if self.max_mps > 0.0 {
            (mc - state.msgs) / self.max_mps
        } else {
            f64::INFINITY
        };
        let byte_wait = if state.bytes >= bc {
            0.0
        } else if self.max_bps > 0.0 {
            (bc - state.bytes) / self.max_bps
        } else {
            f64::INFINITY
        };
        msg_wait.max(byte_wait)
    }
}

impl RateLimiter for TokenBucketLimiter {
    fn obtain(&self, msg_count: u64, byte_count: u64) -> bool {
        // A dead dimension denies everything that requests it
        if (self.max_mps <= 0.0 && msg_count > 0) || (self.max_bps <= 0.0 && byte_count > 0) {
            self.denied.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let mc = msg_count as f64;
        let bc = byte_count as f64;

        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.msgs >= mc && state.bytes >= bc {
            state.msgs -= mc;
            state.bytes -= bc;
            self.total_msgs.fetch_add(msg_count, Ordering::Relaxed);
            self.total_bytes.fetch_add(byte_count, Ordering::Relaxed);
            return true;
        }

        if !self.block {
            self.denied.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let wait = self.wait_needed(&state, mc, bc);
        if !wait.is_finite() || wait > LIMITER_MAX_SLEEP.as_secs_f64() {
            self.denied.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        drop(state);

        std::thread::sleep(Duration::from_secs_f64(wait));
        self.delayed.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        self.refill(&mut state);
        // Grant after the sleep even if a racing producer stole the refill;
        // the deficit is bounded and self-corrects on the next refill.
        state.msgs = (state.msgs - mc).max(0.0);
        state.bytes = (state.bytes - bc).max(0.0);
        self.total_msgs.fetch_add(msg_count, Ordering::Relaxed);
        self.total_bytes.fetch_add(byte_count, Ordering::Relaxed);
        true
    }

    fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    fn delayed(&self) -> u64 {
        self.delayed.load(Ordering::Relaxed)
    }

    fn total_msgs(&self) -> u64 {
        self.total_msgs.load(Ordering::Relaxed)
    }

    fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }
}

/// TTL-assignment and rate-limit decorator
pub struct ThrottledSink {
    name: InlineString,
    inner: Arc<dyn EventSink>,
    limiter: Option<Arc<dyn RateLimiter>>,
    default_ttl: TtlSec,
}

impl ThrottledSink {
    pub fn new(
        inner: Arc<dyn EventSink>,
        limiter: Option<Arc<dyn RateLimiter>>,
        default_ttl: TtlSec,
    ) -> Self {
        let mut name = InlineString::from(inner.name());
        name.push_str("+throttle");
        Self {
            name,
            inner,
            limiter,
            default_ttl,
        }
    }
}

impl EventSink for ThrottledSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> SinkResult<()> {
        self.inner.open()
    }

    fn close(&self) -> SinkResult<()> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn log_item(&self, mut item: Trackable) -> SinkResult<()> {
        if item.ttl_sec() == TTL_CONTEXT {
            item.set_ttl_sec(self.default_ttl);
        }
        if let Some(limiter) = &self.limiter {
            if !limiter.obtain(1, item.byte_size()) {
                // Denied: drop without forwarding; the limiter keeps count
                return Ok(());
            }
        }
        self.inner.log_item(item)
    }

    fn add_error_listener(&self, listener: Arc<dyn SinkErrorListener>) {
        self.inner.add_error_listener(listener);
    }

    fn remove_error_listener(&self, listener: &Arc<dyn SinkErrorListener>) {
        self.inner.remove_error_listener(listener);
    }

    fn collect_stats(&self, out: &mut HashMap<&'static str, i64>) {
        if let Some(limiter) = &self.limiter {
            *out.entry("limiter-total-denied").or_insert(0) += limiter.denied() as i64;
            *out.entry("limiter-total-delays").or_insert(0) += limiter.delayed() as i64;
        }
        self.inner.collect_stats(out);
    }
}
