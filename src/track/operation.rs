/*!
 * Operation Timing State Machine
 * Start/stop lifecycle with wall, CPU, wait, and blocked time accounting
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::TrackError;
use crate::core::types::{TrackResult, TtlSec, TIME_UNAVAILABLE, TTL_CONTEXT};
use crate::time::{default_provider, CausalTimestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::snapshot::{PropertySnapshot, PropertyValue};

/// Operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OpType {
    Noop,
    Call,
    Activity,
    Event,
    Start,
    Stop,
    Open,
    Close,
    Send,
    Receive,
    Inquire,
    Browse,
    Add,
    Update,
    Remove,
    Clear,
    Datagram,
    Other,
}

/// Severity level for tracked items, ordered low to high
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Severity {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
    Failure = 5,
    Critical = 6,
    Fatal = 7,
    Halt = 8,
}

/// Operation completion code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CompCode {
    Success,
    Warning,
    Error,
}

// Internal start/stop guard values
const STATE_NEW: u8 = 0;
const STATE_STARTED: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// A timed unit of work
///
/// Lifecycle is `NEW → STARTED → STOPPED`, guarded by an internal counter so
/// re-entrant `start()`/`stop()` calls are no-ops. Elapsed time is derived at
/// stop; the only way to set it directly is the explicit override on
/// [`Operation::stop_at`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    name: InlineString,
    op_type: OpType,
    severity: Severity,
    comp_code: CompCode,
    reason_code: i32,
    resource: InlineString,
    user: InlineString,
    location: InlineString,
    correlators: HashSet<InlineString>,
    properties: HashMap<InlineString, PropertyValue>,
    snapshots: HashMap<InlineString, PropertySnapshot>,
    start_time: Option<CausalTimestamp>,
    stop_time: Option<CausalTimestamp>,
    elapsed_usec: u64,
    wait_usec: u64,
    ttl_sec: TtlSec,
    thread_timing: bool,

    start_stop_count: u8,
    #[serde(skip)]
    started_at: Option<Instant>,
    start_cpu_usec: Option<u64>,
    stop_cpu_usec: Option<u64>,
    start_blocked_usec: Option<u64>,
    stop_blocked_usec: Option<u64>,
    start_waited_usec: Option<u64>,
    stop_waited_usec: Option<u64>,
}

impl Operation {
    pub fn new(name: &str, op_type: OpType) -> Self {
        Self {
            name: name.into(),
            op_type,
            severity: Severity::Info,
            comp_code: CompCode::Success,
            reason_code: 0,
            resource: InlineString::new(),
            user: InlineString::new(),
            location: InlineString::new(),
            correlators: HashSet::new(),
            properties: HashMap::new(),
            snapshots: HashMap::new(),
            start_time: None,
            stop_time: None,
            elapsed_usec: 0,
            wait_usec: 0,
            ttl_sec: TTL_CONTEXT,
            thread_timing: true,
            start_stop_count: STATE_NEW,
            started_at: None,
            start_cpu_usec: None,
            stop_cpu_usec: None,
            start_blocked_usec: None,
            stop_blocked_usec: None,
            start_waited_usec: None,
            stop_waited_usec: None,
        }
    }

    // -------------------------------------------------------------------------
    // Descriptive fields
    // -------------------------------------------------------------------------

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn op_type(&self) -> OpType {
        self.op_type
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn set_severity(&mut self, severity: Severity) {
        self.severity = severity;
    }

    #[inline]
    pub fn comp_code(&self) -> CompCode {
        self.comp_code
    }

    pub fn set_comp_code(&mut self, code: CompCode) {
        self.comp_code = code;
    }

    #[inline]
    pub fn reason_code(&self) -> i32 {
        self.reason_code
    }

    pub fn set_reason_code(&mut self, code: i32) {
        self.reason_code = code;
    }

    #[inline]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn set_resource(&mut self, resource: &str) {
        self.resource = resource.into();
    }

    #[inline]
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = user.into();
    }

    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = location.into();
    }

    #[inline]
    pub fn ttl_sec(&self) -> TtlSec {
        self.ttl_sec
    }

    pub fn set_ttl_sec(&mut self, ttl: TtlSec) {
        self.ttl_sec = ttl;
    }

    /// Disable thread-level CPU/contention capture for this operation
    pub fn set_thread_timing(&mut self, enabled: bool) {
        self.thread_timing = enabled;
    }

    // -------------------------------------------------------------------------
    // Correlators, properties, snapshots
    // -------------------------------------------------------------------------

    /// Add a correlator; duplicates are ignored
    pub fn add_correlator(&mut self, correlator: impl Into<InlineString>) {
        self.correlators.insert(correlator.into());
    }

    pub fn correlators(&self) -> impl Iterator<Item = &InlineString> {
        self.correlators.iter()
    }

    pub fn correlator_count(&self) -> usize {
        self.correlators.len()
    }

    /// Set a user property; the last write for a name wins
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Attach a metric snapshot, keyed by its `category:name` id
    pub fn add_snapshot(&mut self, snapshot: PropertySnapshot) {
        self.snapshots.insert(snapshot.id(), snapshot);
    }

    pub fn snapshot(&self, id: &str) -> Option<&PropertySnapshot> {
        self.snapshots.get(id)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &PropertySnapshot> {
        self.snapshots.values()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[inline]
    pub fn is_started(&self) -> bool {
        self.start_stop_count >= STATE_STARTED
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.start_stop_count >= STATE_STOPPED
    }

    /// Start the operation now; a no-op if already started
    pub fn start(&mut self) {
        self.start_at(CausalTimestamp::now());
    }

    /// Start the operation at an explicit timestamp; a no-op if already started
    pub fn start_at(&mut self, ts: CausalTimestamp) {
        if self.start_stop_count != STATE_NEW {
            return;
        }
        self.start_stop_count = STATE_STARTED;
        self.start_time = Some(ts);
        self.started_at = Some(Instant::now());
        if self.thread_timing {
            let provider = default_provider();
            self.start_cpu_usec = provider.cpu_time_usec();
            self.start_blocked_usec = provider.blocked_time_usec();
            self.start_waited_usec = provider.waited_time_usec();
        }
    }

    /// Stop the operation now; a no-op once stopped
    pub fn stop(&mut self) -> TrackResult<()> {
        self.stop_at(CausalTimestamp::now(), 0)
    }

    /// Stop the operation at an explicit timestamp
    ///
    /// `elapsed_override` of 0 derives elapsed from the timestamps; a positive
    /// value is taken verbatim. When the stop timestamp precedes the recorded
    /// start, the start time is back-computed from the elapsed value using the
    /// monotonic reading captured at start; history is rewritten rather than
    /// the call rejected. [`TrackError::InvalidTimeRange`] is returned only
    /// when no monotonic delta exists to reconcile with.
    pub fn stop_at(&mut self, ts: CausalTimestamp, elapsed_override: i64) -> TrackResult<()> {
        if self.start_stop_count >= STATE_STOPPED {
            return Ok(());
        }
        if elapsed_override < 0 {
            return Err(TrackError::InvalidDuration(elapsed_override));
        }

        let stop_usec = ts.as_micros();
        let elapsed = if self.start_stop_count == STATE_NEW {
            // Stop without start: only an explicit override can reconstruct
            // the missing start time.
            if elapsed_override > 0 {
                self.start_time = Some(ts.add_new(0, -elapsed_override));
                elapsed_override as u64
            } else {
                return Err(TrackError::InvalidTimeRange {
                    start_usec: 0,
                    stop_usec,
                });
            }
        } else {
            // start_time is always present once STARTED
            let start_usec = self.start_time.map(|t| t.as_micros()).unwrap_or(0);
            if stop_usec >= start_usec {
                if elapsed_override > 0 {
                    elapsed_override as u64
                } else {
                    stop_usec - start_usec
                }
            } else {
                let monotonic_usec = match self.started_at {
                    Some(started) => started.elapsed().as_micros() as u64,
                    None => {
                        return Err(TrackError::InvalidTimeRange {
                            start_usec,
                            stop_usec,
                        })
                    }
                };
                let elapsed = if elapsed_override > 0 {
                    elapsed_override as u64
                } else {
                    monotonic_usec
                };
                self.start_time = Some(ts.add_new(0, -(elapsed as i64)));
                elapsed
            }
        };

        if self.thread_timing {
            let provider = default_provider();
            self.stop_cpu_usec = provider.cpu_time_usec();
            self.stop_blocked_usec = provider.blocked_time_usec();
            self.stop_waited_usec = provider.waited_time_usec();
        }

        self.stop_time = Some(ts);
        self.elapsed_usec = elapsed;
        self.start_stop_count = STATE_STOPPED;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Timing readings
    // -------------------------------------------------------------------------

    #[inline]
    pub fn start_time(&self) -> Option<&CausalTimestamp> {
        self.start_time.as_ref()
    }

    #[inline]
    pub fn stop_time(&self) -> Option<&CausalTimestamp> {
        self.stop_time.as_ref()
    }

    /// Elapsed wall-clock microseconds, valid once stopped
    #[inline]
    pub fn elapsed_usec(&self) -> u64 {
        self.elapsed_usec
    }

    #[inline]
    pub fn wait_usec(&self) -> u64 {
        self.wait_usec
    }

    /// Set explicit wait time; negative values fail fast
    pub fn set_wait_usec(&mut self, wait: i64) -> TrackResult<()> {
        if wait < 0 {
            return Err(TrackError::InvalidDuration(wait));
        }
        self.wait_usec = wait as u64;
        Ok(())
    }

    /// CPU microseconds consumed between start and stop; zero when the
    /// platform exposes no thread CPU clock
    pub fn used_cpu_usec(&self) -> u64 {
        match (self.start_cpu_usec, self.stop_cpu_usec) {
            (Some(start), Some(stop)) => stop.saturating_sub(start),
            _ => 0,
        }
    }

    /// Wall time model: CPU time plus recorded wait time
    pub fn wall_time_usec(&self) -> u64 {
        self.used_cpu_usec() + self.wait_usec
    }

    /// Microseconds spent blocked, or -1 until stop / when unsupported
    pub fn blocked_time_usec(&self) -> i64 {
        if !self.is_stopped() {
            return TIME_UNAVAILABLE;
        }
        match (self.start_blocked_usec, self.stop_blocked_usec) {
            (Some(start), Some(stop)) => stop.saturating_sub(start) as i64,
            _ => TIME_UNAVAILABLE,
        }
    }

    /// Microseconds spent waiting, or -1 until stop / when unsupported
    pub fn waited_time_usec(&self) -> i64 {
        if !self.is_stopped() {
            return TIME_UNAVAILABLE;
        }
        match (self.start_waited_usec, self.stop_waited_usec) {
            (Some(start), Some(stop)) => stop.saturating_sub(start) as i64,
            _ => TIME_UNAVAILABLE,
        }
    }
}
