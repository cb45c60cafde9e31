/*!
 * Property Snapshots
 * Named, timestamped metric captures attachable to operations and activities
 */

use crate::core::data_structures::InlineString;
use crate::core::types::{TtlSec, TTL_CONTEXT};
use crate::time::CausalTimestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Severity;

/// Typed user property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(InlineString),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.into())
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

/// Point-in-time metric capture
///
/// Keyed by `category:name`. Property writes are last-write-wins, matching
/// operation properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySnapshot {
    category: InlineString,
    name: InlineString,
    severity: Severity,
    time: CausalTimestamp,
    parent_id: Option<InlineString>,
    ttl_sec: TtlSec,
    properties: HashMap<InlineString, PropertyValue>,
}

impl PropertySnapshot {
    pub fn new(category: &str, name: &str) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            severity: Severity::Info,
            time: CausalTimestamp::now(),
            parent_id: None,
            ttl_sec: TTL_CONTEXT,
            properties: HashMap::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Snapshot key: `category:name`
    pub fn id(&self) -> InlineString {
        let mut id = self.category.clone();
        id.push_str(":");
        id.push_str(&self.name);
        id
    }

    #[inline]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[inline]
    pub fn time(&self) -> &CausalTimestamp {
        &self.time
    }

    #[inline]
    pub fn parent_id(&self) -> Option<&InlineString> {
        self.parent_id.as_ref()
    }

    pub fn set_parent_id(&mut self, id: InlineString) {
        self.parent_id = Some(id);
    }

    #[inline]
    pub fn ttl_sec(&self) -> TtlSec {
        self.ttl_sec
    }

    pub fn set_ttl_sec(&mut self, ttl: TtlSec) {
        self.ttl_sec = ttl;
    }

    /// Set a property; the last write for a name wins
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn properties(&self) -> impl Iterator<Item = (&InlineString, &PropertyValue)> {
        self.properties.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_id() {
        let snap = PropertySnapshot::new("jvm", "heap");
        assert_eq!(snap.id(), "jvm:heap");
    }

    #[test]
    fn test_property_last_write_wins() {
        let mut snap = PropertySnapshot::new("db", "pool");
        snap.set_property("active", 4i64);
        snap.set_property("active", 7i64);
        assert_eq!(snap.property("active"), Some(&PropertyValue::Int(7)));
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_typed_values() {
        let mut snap = PropertySnapshot::new("app", "state");
        snap.set_property("region", "us-east");
        snap.set_property("ratio", 0.5f64);
        snap.set_property("healthy", true);
        assert_eq!(
            snap.property("region"),
            Some(&PropertyValue::String("us-east".into()))
        );
        assert_eq!(snap.property("healthy"), Some(&PropertyValue::Bool(true)));
    }
}
