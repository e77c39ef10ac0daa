//! Rolling mid-price statistics
//!
//! Keeps a time-bounded window of mid-price samples and derives realized
//! volatility from the log returns between consecutive samples. Each sample
//! caches its log return against its predecessor, so eviction and
//! `volatility()` never recompute logarithms.
//!
//! Eviction is lazy: it only happens on `push`.

use std::collections::VecDeque;
use std::time::Duration;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::errors::EstimatorError;

/// Default rolling window: 30 minutes.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Minimum samples for a volatility estimate (one log return).
pub const MIN_SAMPLES: usize = 2;

/// A single mid-price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidPriceSample {
    /// Unix nanoseconds
    pub timestamp: i64,
    pub mid_price: Decimal,
}

/// Cached per-sample data.
#[derive(Debug, Clone, Copy)]
struct Entry {
    sample: MidPriceSample,
    ln_price: f64,
}

/// Fixed-duration sliding window over mid-price samples.
#[derive(Debug, Clone)]
pub struct RollingStatistics {
    samples: VecDeque<Entry>,
    /// `returns[i]` is the log return from `samples[i]` to `samples[i + 1]`.
    returns: VecDeque<f64>,
    window_nanos: i64,
}

impl RollingStatistics {
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            returns: VecDeque::new(),
            window_nanos: i64::try_from(window.as_nanos()).unwrap_or(i64::MAX),
        }
    }

    /// Append a sample and evict samples older than the window.
    ///
    /// Timestamps behind the newest sample are clamped to it so ordering
    /// stays monotonic in arrival order. Non-positive prices are ignored.
    /// Returns whether the sample was retained.
    pub fn push(&mut self, timestamp: i64, mid_price: Decimal) -> bool {
        let ln_price = match mid_price.to_f64() {
            Some(p) if p > 0.0 && p.is_finite() => p.ln(),
            _ => {
                warn!(%mid_price, "Ignoring non-positive mid price sample");
                return false;
            }
        };

        let timestamp = match self.samples.back() {
            Some(last) if timestamp < last.sample.timestamp => {
                debug!(
                    received = timestamp,
                    newest = last.sample.timestamp,
                    "Clamping out-of-order sample timestamp"
                );
                last.sample.timestamp
            }
            _ => timestamp,
        };

        if let Some(last) = self.samples.back() {
            self.returns.push_back(ln_price - last.ln_price);
        }
        self.samples.push_back(Entry {
            sample: MidPriceSample {
                timestamp,
                mid_price,
            },
            ln_price,
        });

        self.evict(timestamp);
        true
    }

    fn evict(&mut self, newest: i64) {
        let cutoff = newest.saturating_sub(self.window_nanos);
        while let Some(front) = self.samples.front() {
            if front.sample.timestamp >= cutoff {
                break;
            }
            self.samples.pop_front();
            // The evicted sample's outgoing return no longer has a start point.
            self.returns.pop_front();
        }
    }

    /// Population standard deviation of log returns in the window.
    pub fn volatility(&self) -> Result<f64, EstimatorError> {
        if self.samples.len() < MIN_SAMPLES {
            return Err(EstimatorError::InsufficientSamples {
                available: self.samples.len(),
                required: MIN_SAMPLES,
            });
        }

        let n = self.returns.len() as f64;
        let mean = self.returns.iter().sum::<f64>() / n;
        let variance = self
            .returns
            .iter()
            .map(|r| {
                let d = r - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Ok(variance.sqrt())
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Newest retained sample.
    pub fn latest(&self) -> Option<MidPriceSample> {
        self.samples.back().map(|entry| entry.sample)
    }

    /// Oldest retained sample.
    pub fn oldest(&self) -> Option<MidPriceSample> {
        self.samples.front().map(|entry| entry.sample)
    }

    /// Configured window length.
    pub fn window(&self) -> Duration {
        Duration::from_nanos(u64::try_from(self.window_nanos).unwrap_or(u64::MAX))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.returns.clear();
    }
}

impl Default for RollingStatistics {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
