/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::data_structures::InlineString;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tracking errors surfaced synchronously to the producer
///
/// These cover invalid construction values and state-discipline violations.
/// Delivery-path failures never use this type; they are swallowed at the
/// tracker boundary and surface as [`SinkError`] through statistics and
/// sink-error listeners.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum TrackError {
    #[error("Invalid tracking signature: {0}")]
    #[diagnostic(
        code(track::invalid_signature),
        help("Tracking ids must be non-empty and at most MAX_SIGNATURE_LEN bytes.")
    )]
    InvalidSignature(InlineString),

    #[error("Invalid duration: {0} microseconds")]
    #[diagnostic(
        code(track::invalid_duration),
        help("Durations and wait times must be non-negative.")
    )]
    InvalidDuration(i64),

    #[error("Stop time {stop_usec} precedes start time {start_usec} and no monotonic delta is available")]
    #[diagnostic(
        code(track::invalid_time_range),
        help("Call start() before stop(), or supply an explicit elapsed override.")
    )]
    InvalidTimeRange { start_usec: u64, stop_usec: u64 },

    #[error("Activity {0} is not on top of the stack")]
    #[diagnostic(
        code(track::not_on_top),
        help("Activities must be stopped in LIFO order on each thread.")
    )]
    NotOnTop(InlineString),

    #[error("Activity stack is empty")]
    #[diagnostic(
        code(track::empty_stack),
        help("pop() was called with no in-flight activity on this thread.")
    )]
    EmptyStack,

    #[error("Invalid source descriptor: {0}")]
    #[diagnostic(
        code(track::invalid_source),
        help("Sources are #-delimited TYPE=name pairs, e.g. APPL=billing#SERVER=host1.")
    )]
    InvalidSource(InlineString),
}

/// Delivery-path errors
///
/// Producers never see these as return values from reporting calls; they are
/// counted and dispatched to sink-error listeners.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SinkError {
    #[error("Sink {0} is closed")]
    #[diagnostic(
        code(sink::closed),
        help("Open the sink before logging, or let the delivery path reopen it on demand.")
    )]
    Closed(InlineString),

    #[error("Dispatch queue full (capacity {0})")]
    #[diagnostic(
        code(sink::queue_full),
        help("The bounded dispatch queue rejected the item. Raise the capacity or accept drops.")
    )]
    QueueFull(usize),

    #[error("Sink {0} is shut down")]
    #[diagnostic(
        code(sink::shutdown),
        help("The dispatch pool has been shut down and accepts no new work.")
    )]
    Shutdown(InlineString),

    #[error("Write to sink {sink} failed: {reason}")]
    #[diagnostic(
        code(sink::write_failed),
        help("The concrete destination rejected the write. The sink will be reset.")
    )]
    WriteFailed {
        sink: InlineString,
        reason: InlineString,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::NotOnTop("abc-123".into());
        assert!(err.to_string().contains("abc-123"));

        let err = SinkError::QueueFull(128);
        assert!(err.to_string().contains("128"));
    }

    #[test]
    fn test_error_serialization() {
        let err = TrackError::EmptyStack;
        let json = serde_json::to_string(&err).unwrap();
        let back: TrackError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
