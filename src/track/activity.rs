/*!
 * Tracking Activities
 * Named, identified operations that own nested trackable items and notify
 * lifecycle listeners on start/stop
 */

use crate::core::data_structures::InlineString;
use crate::core::id::validate_signature;
use crate::core::types::TrackResult;
use crate::time::CausalTimestamp;
use crate::tracker::Tracker;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::event::TrackingEvent;
use super::operation::{OpType, Operation, Severity};
use super::snapshot::PropertySnapshot;

/// Activity lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ActivityStatus {
    New,
    Begin,
    End,
}

/// Lightweight linkage record for a child trackable item
///
/// Children are reported individually through the sink chain; the parent
/// keeps an ordered record of what it contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    pub id: InlineString,
    pub name: InlineString,
    pub op_type: OpType,
}

/// Activity lifecycle observer
pub trait ActivityListener: Send + Sync {
    fn activity_started(&self, _activity: &TrackingActivity) {}
    fn activity_stopped(&self, _activity: &TrackingActivity) {}
}

/// Registered listeners; registration is mutex-guarded, notification iterates
/// over a snapshot so user callbacks never run under the lock
#[derive(Clone, Default)]
pub struct ActivityListeners {
    inner: Arc<Mutex<Vec<Arc<dyn ActivityListener>>>>,
}

impl ActivityListeners {
    pub fn add(&self, listener: Arc<dyn ActivityListener>) {
        self.inner.lock().push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn ActivityListener>) {
        self.inner.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ActivityListener>> {
        self.inner.lock().clone()
    }
}

impl fmt::Debug for ActivityListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActivityListeners({})", self.len())
    }
}

/// A named, identified unit of work owning nested trackable items
///
/// The disabled ("noop") variant is decided once at creation time: its
/// lifecycle methods return immediately and it is never reported or stacked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingActivity {
    op: Operation,
    id: InlineString,
    parent_id: Option<InlineString>,
    status: ActivityStatus,
    children: Vec<ChildRef>,
    #[serde(skip, default)]
    listeners: ActivityListeners,
    noop: bool,
}

impl TrackingActivity {
    /// Create an activity with a validated tracking id
    pub fn new(name: &str, severity: Severity, id: &str) -> TrackResult<Self> {
        validate_signature(id)?;
        let mut op = Operation::new(name, OpType::Activity);
        op.set_severity(severity);
        Ok(Self {
            op,
            id: id.into(),
            parent_id: None,
            status: ActivityStatus::New,
            children: Vec::new(),
            listeners: ActivityListeners::default(),
            noop: false,
        })
    }

    /// The disabled variant: never reported, stack-transparent
    pub fn noop() -> Self {
        let mut op = Operation::new("noop", OpType::Noop);
        op.set_thread_timing(false);
        Self {
            op,
            id: InlineString::new(),
            parent_id: None,
            status: ActivityStatus::New,
            children: Vec::new(),
            listeners: ActivityListeners::default(),
            noop: true,
        }
    }

    #[inline]
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Unique tracking id
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn parent_id(&self) -> Option<&InlineString> {
        self.parent_id.as_ref()
    }

    pub fn set_parent_id(&mut self, id: InlineString) {
        self.parent_id = Some(id);
    }

    #[inline]
    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    #[inline]
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    #[inline]
    pub fn operation_mut(&mut self) -> &mut Operation {
        &mut self.op
    }

    /// Linkage record describing this activity as somebody's child
    pub fn child_ref(&self) -> ChildRef {
        ChildRef {
            id: self.id.clone(),
            name: self.op.name().into(),
            op_type: self.op.op_type(),
        }
    }

    // -------------------------------------------------------------------------
    // Children
    // -------------------------------------------------------------------------

    /// Adopt an event as a child: sets its parent id and records the linkage
    pub fn add_event(&mut self, event: &mut TrackingEvent) {
        if self.noop || event.is_noop() {
            return;
        }
        event.set_parent_id(self.id.clone());
        self.children.push(ChildRef {
            id: event.signature().into(),
            name: event.operation().name().into(),
            op_type: event.operation().op_type(),
        });
    }

    /// Adopt a sub-activity as a child
    pub fn add_activity(&mut self, child: &mut TrackingActivity) {
        if self.noop || child.is_noop() {
            return;
        }
        child.set_parent_id(self.id.clone());
        self.children.push(child.child_ref());
    }

    /// Attach a metric snapshot: parents it and stores it on the operation
    pub fn add_snapshot(&mut self, mut snapshot: PropertySnapshot) {
        if self.noop {
            return;
        }
        snapshot.set_parent_id(self.id.clone());
        self.op.add_snapshot(snapshot);
    }

    /// Record linkage entries drained from the activity stack
    pub(crate) fn extend_children(&mut self, refs: Vec<ChildRef>) {
        self.children.extend(refs);
    }

    /// Ordered child linkage records
    pub fn children(&self) -> &[ChildRef] {
        &self.children
    }

    pub fn contains_child(&self, id: &str) -> bool {
        self.children.iter().any(|c| c.id == id)
    }

    // -------------------------------------------------------------------------
    // Listeners
    // -------------------------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn ActivityListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ActivityListener>) {
        self.listeners.remove(listener);
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start the activity now and push it onto the tracker's stack
    pub fn start(&mut self, tracker: &Tracker) {
        self.start_at(tracker, CausalTimestamp::now());
    }

    /// Start at an explicit timestamp; a no-op once started
    pub fn start_at(&mut self, tracker: &Tracker, ts: CausalTimestamp) {
        if self.noop || self.op.is_started() {
            return;
        }
        self.op.start_at(ts);
        self.status = ActivityStatus::Begin;
        tracker.push(self);
        for listener in self.listeners.snapshot() {
            listener.activity_started(self);
        }
    }

    /// Stop the activity now and pop it from the tracker's stack
    ///
    /// Fails fast on stack-discipline violations (not on top, empty stack);
    /// a second stop is a no-op.
    pub fn stop(&mut self, tracker: &Tracker) -> TrackResult<()> {
        self.stop_at(tracker, CausalTimestamp::now(), 0)
    }

    /// Stop at an explicit timestamp with an optional elapsed override
    pub fn stop_at(
        &mut self,
        tracker: &Tracker,
        ts: CausalTimestamp,
        elapsed_override: i64,
    ) -> TrackResult<()> {
        if self.noop || self.op.is_stopped() {
            return Ok(());
        }
        self.op.stop_at(ts, elapsed_override)?;
        self.status = ActivityStatus::End;
        tracker.pop(self)?;
        for listener in self.listeners.snapshot() {
            listener.activity_stopped(self);
        }
        Ok(())
    }
}
