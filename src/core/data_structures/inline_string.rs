/*!
 * Inline String Optimization
 * Zero-allocation strings for names, ids, correlators, and property keys
 */

use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;

/// Inline-optimized string that stores short strings (≤23 bytes) without heap allocation
///
/// # Performance
///
/// - **Small strings** (≤23 bytes): Stored inline, zero allocation
/// - **Large strings** (>23 bytes): Heap allocated like regular String
/// - Most operation names, correlators, and property keys fit inline
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct InlineString {
    inner: SmartString,
}

impl InlineString {
    /// Create new inline string
    #[inline]
    pub fn new() -> Self {
        Self {
            inner: SmartString::new(),
        }
    }

    /// Get string slice
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    /// Check if string is stored inline (no heap allocation)
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.inner.is_inline()
    }

    /// Get length
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Push string slice
    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.inner.push_str(s);
    }

    /// Convert to String (may allocate if inline)
    #[inline]
    pub fn into_string(self) -> String {
        self.inner.into()
    }
}

impl From<&str> for InlineString {
    #[inline]
    fn from(s: &str) -> Self {
        Self {
            inner: SmartString::from(s),
        }
    }
}

impl From<String> for InlineString {
    #[inline]
    fn from(s: String) -> Self {
        Self {
            inner: SmartString::from(s),
        }
    }
}

impl From<InlineString> for String {
    #[inline]
    fn from(s: InlineString) -> Self {
        s.inner.into()
    }
}

impl AsRef<str> for InlineString {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::ops::Deref for InlineString {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for InlineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::borrow::Borrow<str> for InlineString {
    #[inline(always)]
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for InlineString {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for InlineString {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_storage() {
        let short = InlineString::from("order-checkout");
        assert!(short.is_inline(), "Short strings should be inline");
        assert_eq!(short.as_str(), "order-checkout");
    }

    #[test]
    fn test_long_string_heap_allocated() {
        let long = InlineString::from(
            "this is a long correlator value that definitely exceeds the inline threshold",
        );
        assert!(!long.is_inline(), "Long strings should use heap");
        assert!(long.as_str().contains("long correlator"));
    }

    #[test]
    fn test_conversions() {
        let inline_str = InlineString::from("test");
        let string: String = inline_str.clone().into();
        assert_eq!(string, "test");

        let from_string = InlineString::from(String::from("another"));
        assert_eq!(from_string.as_str(), "another");
    }

    #[test]
    fn test_serialization() {
        let inline_str = InlineString::from("payment-service");
        let json = serde_json::to_string(&inline_str).unwrap();
        let deserialized: InlineString = serde_json::from_str(&json).unwrap();
        assert_eq!(inline_str, deserialized);
    }
}
