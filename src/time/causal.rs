/*!
 * Causal Timestamps
 * Microsecond wall-clock timestamps carrying a Lamport logical clock
 *
 * Physical ordering is by (milliseconds, microsecond fraction) only; the
 * Lamport value travels with each timestamp so a consumer can reconstruct
 * causal order across threads and processes even when wall clocks tie or
 * disagree.
 */

use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Process-wide Lamport counter
///
/// Advanced past any observed foreign value with a compare-and-swap loop.
/// The shared instance is seeded from current wall-time milliseconds on
/// first use; tests construct their own instances for isolation.
#[derive(Debug, Clone)]
pub struct LamportClock {
    counter: Arc<AtomicU64>,
}

impl LamportClock {
    /// Create a clock starting at the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(seed)),
        }
    }

    /// The process-wide shared clock, seeded from wall time on first use
    pub fn shared() -> &'static LamportClock {
        static SHARED: OnceLock<LamportClock> = OnceLock::new();
        SHARED.get_or_init(|| {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            LamportClock::new(seed)
        })
    }

    /// Advance by one local tick and return the new value
    #[inline]
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Observe a foreign clock value per the Lamport rule
    ///
    /// While `received` is at or ahead of the local counter, advance the
    /// counter to `received + 1`. Returns the counter value the caller
    /// should adopt: strictly greater than `received` when `received` was
    /// at or ahead, the unchanged local value otherwise.
    pub fn observe(&self, received: u64) -> u64 {
        loop {
            let local = self.counter.load(Ordering::SeqCst);
            if received < local {
                return local;
            }
            let next = received + 1;
            if self
                .counter
                .compare_exchange(local, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return next;
            }
        }
    }

    /// Current counter value
    #[inline]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

/// Microsecond-resolution timestamp with a Lamport logical clock
///
/// Ordering, equality, and hashing consider only the physical fields
/// (milliseconds + microsecond fraction); the Lamport value is
/// informational and surfaced via [`CausalTimestamp::lamport`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CausalTimestamp {
    millis: u64,
    /// Microsecond fraction, always in 0..=999
    micros: u16,
    lamport: u64,
}

impl CausalTimestamp {
    /// Current wall-clock time, stamped from the shared Lamport clock
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let usec = elapsed.as_micros() as u64;
        Self::from_micros(usec)
    }

    /// Construct from raw microseconds since the epoch
    pub fn from_micros(usec: u64) -> Self {
        Self {
            millis: usec / 1000,
            micros: (usec % 1000) as u16,
            lamport: LamportClock::shared().tick(),
        }
    }

    /// Construct from a millisecond + microsecond-fraction pair
    ///
    /// A fraction of 1000 or more carries into the millisecond field, so
    /// the invariant `micros < 1000` always holds.
    pub fn new(millis: u64, micros: u32) -> Self {
        Self {
            millis: millis + (micros / 1000) as u64,
            micros: (micros % 1000) as u16,
            lamport: LamportClock::shared().tick(),
        }
    }

    /// Milliseconds since the epoch
    #[inline]
    pub fn millis(&self) -> u64 {
        self.millis
    }

    /// Microsecond fraction (0..=999)
    #[inline]
    pub fn micros_fraction(&self) -> u16 {
        self.micros
    }

    /// Total microseconds since the epoch
    #[inline]
    pub fn as_micros(&self) -> u64 {
        self.millis * 1000 + self.micros as u64
    }

    /// The Lamport value carried by this timestamp
    #[inline]
    pub fn lamport(&self) -> u64 {
        self.lamport
    }

    /// Apply the Lamport rule against the shared process-wide clock
    ///
    /// Call on the receiving side with the clock value embedded in an
    /// incoming message; the local counter advances past it and this
    /// timestamp adopts the advanced value.
    pub fn assign_lamport(&mut self, received: u64) {
        self.assign_lamport_with(LamportClock::shared(), received);
    }

    /// Apply the Lamport rule against an explicit clock (testable variant)
    pub fn assign_lamport_with(&mut self, clock: &LamportClock, received: u64) {
        self.lamport = clock.observe(received);
    }

    /// Add a signed (milliseconds, microseconds) delta in place
    ///
    /// Carry and borrow are normalized into the millisecond field; the
    /// microsecond fraction never leaves 0..=999.
    pub fn add(&mut self, millis: i64, micros: i64) {
        let total = self.as_micros() as i64 + millis * 1000 + micros;
        let clamped = total.max(0) as u64;
        self.millis = clamped / 1000;
        self.micros = (clamped % 1000) as u16;
    }

    /// Add a signed microsecond delta in place
    #[inline]
    pub fn add_usec(&mut self, micros: i64) {
        self.add(0, micros);
    }

    /// Return a new timestamp offset by a signed (ms, us) delta
    pub fn add_new(&self, millis: i64, micros: i64) -> Self {
        let mut out = *self;
        out.add(millis, micros);
        out
    }

    /// Signed microsecond difference; negative when `self` precedes `other`
    #[inline]
    pub fn difference(&self, other: &CausalTimestamp) -> i64 {
        self.as_micros() as i64 - other.as_micros() as i64
    }
}

impl PartialEq for CausalTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.millis == other.millis && self.micros == other.micros
    }
}

impl Eq for CausalTimestamp {}

impl Hash for CausalTimestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.millis.hash(state);
        self.micros.hash(state);
    }
}

impl PartialOrd for CausalTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for CausalTimestamp {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.millis
            .cmp(&other.millis)
            .then(self.micros.cmp(&other.micros))
    }
}

impl fmt::Display for CausalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.millis, self.micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serial_test::serial;

    #[test]
    fn test_carry_into_millis() {
        let ts = CausalTimestamp::new(5, 700).add_new(0, 400);
        assert_eq!(ts.millis(), 6);
        assert_eq!(ts.micros_fraction(), 100);
    }

    #[test]
    fn test_borrow_from_millis() {
        let mut ts = CausalTimestamp::new(5, 100);
        ts.add(0, -400);
        assert_eq!(ts.millis(), 4);
        assert_eq!(ts.micros_fraction(), 700);
    }

    #[test]
    fn test_fraction_normalized_at_construction() {
        let ts = CausalTimestamp::new(1, 2500);
        assert_eq!(ts.millis(), 3);
        assert_eq!(ts.micros_fraction(), 500);
    }

    #[test]
    fn test_difference_sign() {
        let a = CausalTimestamp::new(10, 0);
        let b = CausalTimestamp::new(10, 250);
        assert_eq!(a.difference(&b), -250);
        assert_eq!(b.difference(&a), 250);
        assert!(a < b);
    }

    #[test]
    fn test_physical_ordering_ignores_lamport() {
        let clock = LamportClock::new(0);
        let mut a = CausalTimestamp::new(7, 7);
        let b = CausalTimestamp::new(7, 7);
        a.assign_lamport_with(&clock, 1_000);
        assert_eq!(a, b);
        assert_ne!(a.lamport(), b.lamport());
    }

    #[test]
    fn test_observe_advances_past_received() {
        let clock = LamportClock::new(10);
        let adopted = clock.observe(25);
        assert_eq!(adopted, 26);
        assert_eq!(clock.current(), 26);
    }

    #[test]
    fn test_observe_ignores_stale() {
        let clock = LamportClock::new(100);
        let adopted = clock.observe(5);
        assert_eq!(adopted, 100);
        assert_eq!(clock.current(), 100);
    }

    #[test]
    #[serial]
    fn test_shared_clock_monotonic_per_construction() {
        let a = CausalTimestamp::now();
        let b = CausalTimestamp::now();
        assert!(b.lamport() > a.lamport());
    }

    #[test]
    fn test_causal_pair_totally_ordered() {
        // Sender embeds its clock; receiver observes it. Receiver's lamport
        // value must land strictly after the sender's even with identical
        // wall-clock readings.
        let clock = LamportClock::new(50);
        let mut sender = CausalTimestamp::new(123, 456);
        sender.assign_lamport_with(&clock, clock.current());

        let mut receiver = CausalTimestamp::new(123, 456);
        receiver.assign_lamport_with(&clock, sender.lamport());
        assert!(receiver.lamport() > sender.lamport());
    }

    proptest! {
        #[test]
        fn prop_carry_correctness(m in 0u64..1_000_000, u in 0u32..1000) {
            let ts = CausalTimestamp::new(m, u).add_new(0, (1000 - u) as i64);
            prop_assert_eq!(ts.millis(), m + 1);
            prop_assert_eq!(ts.micros_fraction(), 0);
        }

        #[test]
        fn prop_fraction_always_in_range(
            m in 0u64..1_000_000,
            u in 0u32..1000,
            dm in -1000i64..1000,
            du in -1_000_000i64..1_000_000,
        ) {
            let ts = CausalTimestamp::new(m, u).add_new(dm, du);
            prop_assert!(ts.micros_fraction() < 1000);
        }

        #[test]
        fn prop_difference_antisymmetric(a in 0u64..u32::MAX as u64, b in 0u64..u32::MAX as u64) {
            let ta = CausalTimestamp::from_micros(a);
            let tb = CausalTimestamp::from_micros(b);
            prop_assert_eq!(ta.difference(&tb), -tb.difference(&ta));
            prop_assert_eq!(ta.difference(&tb) < 0, ta < tb);
        }
    }
}
