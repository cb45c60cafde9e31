/*!
 * Source Metadata
 * Hierarchical provenance descriptors attached to trackers and reported items
 *
 * Serialized form is `#`-delimited `TYPE=name` pairs, outermost last:
 * `APPL=billing#SERVER=host1#DATACENTER=east`.
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::TrackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SourceType {
    User,
    Appl,
    Process,
    Server,
    Netaddr,
    Datacenter,
    Geoaddr,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::User => "USER",
            SourceType::Appl => "APPL",
            SourceType::Process => "PROCESS",
            SourceType::Server => "SERVER",
            SourceType::Netaddr => "NETADDR",
            SourceType::Datacenter => "DATACENTER",
            SourceType::Geoaddr => "GEOADDR",
        }
    }
}

impl FromStr for SourceType {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(SourceType::User),
            "APPL" => Ok(SourceType::Appl),
            "PROCESS" => Ok(SourceType::Process),
            "SERVER" => Ok(SourceType::Server),
            "NETADDR" => Ok(SourceType::Netaddr),
            "DATACENTER" => Ok(SourceType::Datacenter),
            "GEOADDR" => Ok(SourceType::Geoaddr),
            other => Err(TrackError::InvalidSource(other.into())),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hierarchical named source entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    source_type: SourceType,
    name: InlineString,
    parent: Option<Box<Source>>,
}

impl Source {
    pub fn new(source_type: SourceType, name: &str) -> Self {
        Self {
            source_type,
            name: name.into(),
            parent: None,
        }
    }

    /// Attach an enclosing source (e.g. the server an application runs on)
    pub fn with_parent(mut self, parent: Source) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    #[inline]
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parent(&self) -> Option<&Source> {
        self.parent.as_deref()
    }

    /// Fully qualified name: `TYPE=name` pairs, `#`-delimited, outermost last
    pub fn fqn(&self) -> String {
        let mut out = String::new();
        let mut cursor = Some(self);
        while let Some(src) = cursor {
            if !out.is_empty() {
                out.push('#');
            }
            out.push_str(src.source_type.as_str());
            out.push('=');
            out.push_str(&src.name);
            cursor = src.parent.as_deref();
        }
        out
    }

    /// Parse a fully qualified name back into a source chain
    pub fn from_fqn(fqn: &str) -> Result<Self, TrackError> {
        let mut source: Option<Source> = None;
        // Pairs are outermost-last, so build the chain from the end
        for pair in fqn.split('#').rev() {
            let (ty, name) = pair
                .split_once('=')
                .ok_or_else(|| TrackError::InvalidSource(pair.into()))?;
            if name.is_empty() {
                return Err(TrackError::InvalidSource(pair.into()));
            }
            let mut node = Source::new(ty.parse()?, name);
            if let Some(parent) = source.take() {
                node = node.with_parent(parent);
            }
            source = Some(node);
        }
        source.ok_or_else(|| TrackError::InvalidSource("empty".into()))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqn_outermost_last() {
        let src = Source::new(SourceType::Appl, "billing").with_parent(
            Source::new(SourceType::Server, "host1")
                .with_parent(Source::new(SourceType::Datacenter, "east")),
        );
        assert_eq!(src.fqn(), "APPL=billing#SERVER=host1#DATACENTER=east");
    }

    #[test]
    fn test_fqn_round_trip() {
        let fqn = "APPL=billing#SERVER=host1#NETADDR=10.0.0.7";
        let src = Source::from_fqn(fqn).unwrap();
        assert_eq!(src.source_type(), SourceType::Appl);
        assert_eq!(src.name(), "billing");
        assert_eq!(src.parent().unwrap().source_type(), SourceType::Server);
        assert_eq!(src.fqn(), fqn);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Source::from_fqn("APPL").is_err());
        assert!(Source::from_fqn("APPL=").is_err());
        assert!(Source::from_fqn("BOGUS=x").is_err());
        assert!(Source::from_fqn("").is_err());
    }
}
