//! Instrument identifiers
//!
//! Every pipeline instance is bound to exactly one instrument, so the
//! identifier is carried through book state and emitted metrics to keep
//! independent per-pair pipelines distinguishable downstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separators accepted between base and quote asset.
const SEPARATORS: [char; 2] = ['/', '-'];

/// Market identifier (trading pair)
///
/// Format: "BASE/QUOTE" or venue style "BASE-QUOTE[-SUFFIX]"
/// (e.g., "BTC/USDT", "BTC-USDT-SWAP").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from a string
    ///
    /// # Panics
    /// Panics if the symbol has no base/quote separator
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(
            s.contains(SEPARATORS),
            "MarketId must be in BASE/QUOTE or BASE-QUOTE format"
        );
        Self(s)
    }

    /// Try to create a MarketId, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.contains(SEPARATORS) {
            Some(Self(s))
        } else {
            None
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into base and quote assets, ignoring any venue suffix.
    pub fn split(&self) -> (&str, &str) {
        let mut parts = self.0.split(SEPARATORS);
        let base = parts.next().unwrap_or_default();
        let quote = parts.next().unwrap_or_default();
        (base, quote)
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
