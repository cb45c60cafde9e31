/*!
 * Core Types
 * Common types used across the tracking runtime
 */

/// Microsecond duration type
pub type Usec = u64;

/// Signed microsecond delta (differences may run backwards)
pub type UsecDelta = i64;

/// Time-to-live in seconds attached to reported items
pub type TtlSec = i64;

/// Common result type for tracking operations
pub type TrackResult<T> = Result<T, super::errors::TrackError>;

/// Common result type for sink delivery operations
pub type SinkResult<T> = Result<T, super::errors::SinkError>;

/// Sentinel for thread timing values the platform does not expose
pub const TIME_UNAVAILABLE: i64 = -1;

/// TTL value meaning "inherit the sink chain default"
pub const TTL_CONTEXT: TtlSec = 0;

/// TTL value meaning "no expiry"
pub const TTL_NONE: TtlSec = -1;
