/*!
 * Signature Generation
 * Replaceable tracking-id factories with validation
 */

use crate::core::data_structures::InlineString;
use crate::core::errors::TrackError;
use crate::core::limits::MAX_SIGNATURE_LEN;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Pluggable tracking-id source
///
/// Trackers stamp every activity and event with a signature from their
/// configured factory. The default is UUID v4; tests swap in a counter
/// factory for deterministic ids.
pub trait SignatureFactory: Send + Sync {
    /// Generate the next unique signature
    fn new_signature(&self) -> InlineString;
}

/// UUID v4 signature factory (default)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidFactory;

impl SignatureFactory for UuidFactory {
    #[inline]
    fn new_signature(&self) -> InlineString {
        Uuid::new_v4().to_string().into()
    }
}

/// Sequential signature factory for deterministic tests
///
/// Produces `<prefix>-1`, `<prefix>-2`, ...
pub struct CounterFactory {
    prefix: InlineString,
    counter: Arc<AtomicU64>,
}

impl CounterFactory {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl SignatureFactory for CounterFactory {
    fn new_signature(&self) -> InlineString {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n).into()
    }
}

/// Validate a tracking signature: non-empty, bounded length
pub fn validate_signature(sig: &str) -> Result<(), TrackError> {
    if sig.is_empty() {
        return Err(TrackError::InvalidSignature("empty".into()));
    }
    if sig.len() > MAX_SIGNATURE_LEN {
        return Err(TrackError::InvalidSignature(
            format!("{} bytes exceeds maximum", sig.len()).into(),
        ));
    }
    Ok(())
}
