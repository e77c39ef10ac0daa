//! Slippage estimation
//!
//! Predicts the slippage fraction of an order from the shape of the book:
//! top-N bid volumes, top-N ask volumes (zero padded) and the notional.
//! The default model is a linear median quantile regression.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use types::errors::EstimatorError;
use types::order::{OrderParameters, Side};

use super::synthetic::{dot, fit_quantile, slippage_dataset};
use super::{scale_by_notional, to_decimal, SlippageModel};
use crate::order_book::OrderBookState;

/// Median
pub const DEFAULT_QUANTILE: f64 = 0.5;

/// Linear quantile regression weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearQuantileModel {
    pub quantile: f64,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearQuantileModel {
    pub fn new(quantile: f64, intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            quantile,
            intercept,
            coefficients,
        }
    }

    /// Median regression fitted on the seeded synthetic dataset for a book
    /// of `depth` levels per side.
    pub fn fallback(depth: usize, seed: u64) -> Self {
        let data = slippage_dataset(depth, seed);
        let (intercept, coefficients) = fit_quantile(&data, DEFAULT_QUANTILE);
        Self::new(DEFAULT_QUANTILE, intercept, coefficients)
    }
}

impl SlippageModel for LinearQuantileModel {
    fn predict(&self, features: &[f64]) -> Result<f64, EstimatorError> {
        if features.len() != self.coefficients.len() {
            return Err(EstimatorError::FeatureMismatch {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        let prediction = self.intercept + dot(&self.coefficients, features);
        if !prediction.is_finite() {
            return Err(EstimatorError::NonFinite {
                model: "slippage".to_string(),
            });
        }
        Ok(prediction)
    }

    fn feature_count(&self) -> usize {
        self.coefficients.len()
    }
}

/// Result of one slippage estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlippageEstimate {
    /// Fraction of notional, never negative.
    pub slippage_pct: f64,
    pub cost: Decimal,
}

#[derive(Debug)]
pub struct SlippageEstimator {
    model: Box<dyn SlippageModel>,
    depth: usize,
}

impl SlippageEstimator {
    pub fn new(model: Box<dyn SlippageModel>, depth: usize) -> Self {
        Self { model, depth }
    }

    pub fn fallback(depth: usize, seed: u64) -> Self {
        Self::new(Box::new(LinearQuantileModel::fallback(depth, seed)), depth)
    }

    /// Levels per side in the feature vector.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Feature vector: bid volumes ++ ask volumes (zero padded to `depth`
    /// each) ++ notional.
    pub fn features(&self, book: &OrderBookState, order: &OrderParameters) -> Vec<f64> {
        let mut features = Vec::with_capacity(2 * self.depth + 1);
        for side in [Side::BUY, Side::SELL] {
            let levels = book.top_n(side, self.depth);
            features.extend(levels.iter().map(|level| level.volume.to_f64()));
            features.extend(std::iter::repeat(0.0).take(self.depth - levels.len()));
        }
        features.push(order.notional_usd.to_f64().unwrap_or(0.0));
        features
    }

    pub fn estimate(
        &self,
        book: &OrderBookState,
        order: &OrderParameters,
    ) -> Result<SlippageEstimate, EstimatorError> {
        let raw = self.model.predict(&self.features(book, order))?;
        if !raw.is_finite() {
            return Err(EstimatorError::NonFinite {
                model: "slippage".to_string(),
            });
        }
        let slippage_pct = raw.max(0.0);
        let pct = to_decimal(slippage_pct, "slippage")?;
        let cost = scale_by_notional(pct, order.notional_usd, "slippage")?;
        Ok(SlippageEstimate { slippage_pct, cost })
    }
}
