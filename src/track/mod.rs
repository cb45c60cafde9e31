/*!
 * Tracking Entities
 * Operations, activities, events, snapshots, and source metadata
 */

pub mod activity;
pub mod event;
pub mod operation;
pub mod snapshot;
pub mod source;

pub use activity::{ActivityListener, ActivityStatus, ChildRef, TrackingActivity};
pub use event::{EventPayload, Relation, TrackingEvent};
pub use operation::{CompCode, OpType, Operation, Severity};
pub use snapshot::{PropertySnapshot, PropertyValue};
pub use source::{Source, SourceType};

use crate::core::types::{TtlSec, TTL_NONE};
use serde::{Deserialize, Serialize};

/// One reportable unit of work handed to the sink chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trackable {
    Activity(TrackingActivity),
    Event(TrackingEvent),
    Snapshot(PropertySnapshot),
    Message { severity: Severity, text: String },
}

impl Trackable {
    /// Stable kind label for statistics and diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Trackable::Activity(_) => "activity",
            Trackable::Event(_) => "event",
            Trackable::Snapshot(_) => "snapshot",
            Trackable::Message { .. } => "message",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Trackable::Activity(a) => a.operation().severity(),
            Trackable::Event(e) => e.operation().severity(),
            Trackable::Snapshot(s) => s.severity(),
            Trackable::Message { severity, .. } => *severity,
        }
    }

    pub fn is_noop(&self) -> bool {
        match self {
            Trackable::Activity(a) => a.is_noop(),
            Trackable::Event(e) => e.is_noop(),
            _ => false,
        }
    }

    /// Time-to-live; messages carry none
    pub fn ttl_sec(&self) -> TtlSec {
        match self {
            Trackable::Activity(a) => a.operation().ttl_sec(),
            Trackable::Event(e) => e.operation().ttl_sec(),
            Trackable::Snapshot(s) => s.ttl_sec(),
            Trackable::Message { .. } => TTL_NONE,
        }
    }

    pub fn set_ttl_sec(&mut self, ttl: TtlSec) {
        match self {
            Trackable::Activity(a) => a.operation_mut().set_ttl_sec(ttl),
            Trackable::Event(e) => e.operation_mut().set_ttl_sec(ttl),
            Trackable::Snapshot(s) => s.set_ttl_sec(ttl),
            Trackable::Message { .. } => {}
        }
    }

    /// Approximate wire size in bytes, used for byte-rate limiting
    pub fn byte_size(&self) -> u64 {
        match self {
            Trackable::Activity(a) => a.operation().name().len() as u64,
            Trackable::Event(e) => (e.operation().name().len() + e.size()) as u64,
            Trackable::Snapshot(s) => (s.category().len() + s.name().len() + s.len() * 16) as u64,
            Trackable::Message { text, .. } => text.len() as u64,
        }
    }
}

impl From<TrackingActivity> for Trackable {
    fn from(a: TrackingActivity) -> Self {
        Trackable::Activity(a)
    }
}

impl From<TrackingEvent> for Trackable {
    fn from(e: TrackingEvent) -> Self {
        Trackable::Event(e)
    }
}

impl From<PropertySnapshot> for Trackable {
    fn from(s: PropertySnapshot) -> Self {
        Trackable::Snapshot(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        let snap: Trackable = PropertySnapshot::new("a", "b").into();
        assert_eq!(snap.kind(), "snapshot");

        let msg = Trackable::Message {
            severity: Severity::Info,
            text: "hello".into(),
        };
        assert_eq!(msg.kind(), "message");
        assert_eq!(msg.byte_size(), 5);
        assert_eq!(msg.ttl_sec(), TTL_NONE);
    }

    #[test]
    fn test_noop_detection() {
        let act: Trackable = TrackingActivity::noop().into();
        assert!(act.is_noop());

        let ev: Trackable = TrackingEvent::noop().into();
        assert!(ev.is_noop());
    }
}
