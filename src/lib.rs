/*!
 * Trackway
 * Application instrumentation and telemetry runtime: activity/event
 * correlation, Lamport-synchronized causal timestamps, and an asynchronous
 * sink delivery pipeline
 */

pub mod core;
pub mod diag;
pub mod sink;
pub mod time;
pub mod track;
pub mod tracker;

// Re-exports
pub use crate::core::errors::{SinkError, TrackError};
pub use crate::core::{CounterFactory, InlineString, SignatureFactory, UuidFactory};
pub use sink::{
    BufferedSink, ConsoleSink, EventSink, FilteredSink, LevelFilter, MemorySink, PooledLogger,
    RateLimiter, SinkFilter, ThrottledSink, TokenBucketLimiter,
};
pub use time::{CausalTimestamp, LamportClock};
pub use track::{
    ActivityListener, CompCode, OpType, Operation, PropertySnapshot, PropertyValue, Severity,
    Source, SourceType, Trackable, TrackingActivity, TrackingEvent,
};
pub use tracker::{
    LevelSelector, StackFrame, Tracker, TrackerConfig, TrackerStats, TrackingFilter,
    TrackingSelector,
};
