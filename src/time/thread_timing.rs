/*!
 * Thread Timing Provider
 * Capability-checked access to per-thread CPU and contention timing
 *
 * Platforms differ in what they expose. Each reading is an Option; callers
 * surface the documented -1 sentinel for values the platform cannot supply
 * instead of guessing a fallback.
 */

/// Capability-checked source of per-thread timing readings
pub trait ThreadTimeProvider: Send + Sync {
    /// CPU time consumed by the calling thread, in microseconds
    fn cpu_time_usec(&self) -> Option<u64>;

    /// Time the calling thread spent blocked on monitors, in microseconds
    fn blocked_time_usec(&self) -> Option<u64>;

    /// Time the calling thread spent waiting, in microseconds
    fn waited_time_usec(&self) -> Option<u64>;
}

/// Unix provider backed by `CLOCK_THREAD_CPUTIME_ID`
///
/// Contention (blocked/waited) timing has no stable cross-platform source
/// and reports unsupported.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixThreadTime;

#[cfg(unix)]
impl ThreadTimeProvider for UnixThreadTime {
    fn cpu_time_usec(&self) -> Option<u64> {
        nix::time::clock_gettime(nix::time::ClockId::CLOCK_THREAD_CPUTIME_ID)
            .ok()
            .map(|ts| ts.tv_sec() as u64 * 1_000_000 + ts.tv_nsec() as u64 / 1_000)
    }

    fn blocked_time_usec(&self) -> Option<u64> {
        None
    }

    fn waited_time_usec(&self) -> Option<u64> {
        None
    }
}

/// Provider for platforms without thread timing support
#[derive(Debug, Default, Clone, Copy)]
pub struct NullThreadTime;

impl ThreadTimeProvider for NullThreadTime {
    fn cpu_time_usec(&self) -> Option<u64> {
        None
    }

    fn blocked_time_usec(&self) -> Option<u64> {
        None
    }

    fn waited_time_usec(&self) -> Option<u64> {
        None
    }
}

/// The platform default provider
pub fn default_provider() -> &'static dyn ThreadTimeProvider {
    #[cfg(unix)]
    {
        static PROVIDER: UnixThreadTime = UnixThreadTime;
        &PROVIDER
    }
    #[cfg(not(unix))]
    {
        static PROVIDER: NullThreadTime = NullThreadTime;
        &PROVIDER
    }
}
