/*!
 * Tracking Events
 * Message-like trackable entities bound one-to-one with an Operation
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::TrackError;
use crate::core::id::validate_signature;
use crate::core::types::TrackResult;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::operation::{OpType, Operation, Severity};
use super::source::Source;

/// Event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    None,
    Text(String),
    Binary(Bytes),
}

impl EventPayload {
    /// Payload size in bytes
    pub fn size(&self) -> usize {
        match self {
            EventPayload::None => 0,
            EventPayload::Text(s) => s.len(),
            EventPayload::Binary(b) => b.len(),
        }
    }
}

/// Point-to-point relation between two sources (e.g. send → receive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from: Source,
    pub to: Source,
    pub kind: OpType,
}

/// A reportable event with payload, correlation id, and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingEvent {
    op: Operation,
    signature: InlineString,
    parent_id: Option<InlineString>,
    payload: EventPayload,
    encoding: InlineString,
    relation: Option<Relation>,
    noop: bool,
}

impl TrackingEvent {
    /// Create an event with a validated signature
    pub fn new(
        severity: Severity,
        op_type: OpType,
        name: &str,
        signature: &str,
    ) -> TrackResult<Self> {
        validate_signature(signature)?;
        let mut op = Operation::new(name, op_type);
        op.set_severity(severity);
        Ok(Self {
            op,
            signature: signature.into(),
            parent_id: None,
            payload: EventPayload::None,
            encoding: InlineString::from("none"),
            relation: None,
            noop: false,
        })
    }

    /// The disabled variant: never reported, stack-transparent
    pub fn noop() -> Self {
        let mut op = Operation::new("noop", OpType::Noop);
        op.set_thread_timing(false);
        Self {
            op,
            signature: InlineString::new(),
            parent_id: None,
            payload: EventPayload::None,
            encoding: InlineString::from("none"),
            relation: None,
            noop: true,
        }
    }

    #[inline]
    pub fn is_noop(&self) -> bool {
        self.noop
    }

    #[inline]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    #[inline]
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    #[inline]
    pub fn operation_mut(&mut self) -> &mut Operation {
        &mut self.op
    }

    #[inline]
    pub fn parent_id(&self) -> Option<&InlineString> {
        self.parent_id.as_ref()
    }

    pub fn set_parent_id(&mut self, id: InlineString) {
        self.parent_id = Some(id);
    }

    /// Set a UTF-8 text payload
    pub fn set_message(&mut self, text: &str) {
        self.payload = EventPayload::Text(text.to_string());
        self.encoding = InlineString::from("utf8");
    }

    /// Set a binary payload; size is derived from the payload
    pub fn set_binary(&mut self, data: Bytes) {
        self.payload = EventPayload::Binary(data);
        self.encoding = InlineString::from("binary");
    }

    #[inline]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    #[inline]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Payload size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.payload.size()
    }

    /// Relate this event to a peer (e.g. `send → receive` between sources)
    pub fn relate(&mut self, from: Source, to: Source, kind: OpType) {
        self.relation = Some(Relation { from, to, kind });
    }

    #[inline]
    pub fn relation(&self) -> Option<&Relation> {
        self.relation.as_ref()
    }
}

impl TrackingEvent {
    /// Re-check construction invariants on a populated event
    pub fn validate(&self) -> TrackResult<()> {
        if self.noop {
            return Ok(());
        }
        validate_signature(&self.signature)
            .map_err(|_| TrackError::InvalidSignature(self.signature.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let mut event =
            TrackingEvent::new(Severity::Info, OpType::Event, "db-query", "sig-1").unwrap();
        event.set_message("select 1");
        assert_eq!(event.size(), 8);
        assert_eq!(event.encoding(), "utf8");
        assert_eq!(event.operation().severity(), Severity::Info);
    }

    #[test]
    fn test_invalid_signature_rejected() {
        assert!(TrackingEvent::new(Severity::Info, OpType::Event, "x", "").is_err());
        let long = "s".repeat(500);
        assert!(TrackingEvent::new(Severity::Info, OpType::Event, "x", &long).is_err());
    }

    #[test]
    fn test_binary_payload() {
        let mut event =
            TrackingEvent::new(Severity::Debug, OpType::Send, "frame", "sig-2").unwrap();
        event.set_binary(Bytes::from_static(&[1, 2, 3, 4]));
        assert_eq!(event.size(), 4);
        assert_eq!(event.encoding(), "binary");
    }

    #[test]
    fn test_relation() {
        use super::super::source::SourceType;
        let mut event =
            TrackingEvent::new(Severity::Info, OpType::Send, "order-sent", "sig-3").unwrap();
        event.relate(
            Source::new(SourceType::Appl, "producer"),
            Source::new(SourceType::Appl, "consumer"),
            OpType::Send,
        );
        let rel = event.relation().unwrap();
        assert_eq!(rel.kind, OpType::Send);
        assert_eq!(rel.from.name(), "producer");
    }

    #[test]
    fn test_noop_event() {
        let event = TrackingEvent::noop();
        assert!(event.is_noop());
        assert!(event.validate().is_ok());
    }
}
