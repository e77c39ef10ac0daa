//! Almgren–Chriss market impact
//!
//! `impact(q, V, σ) = γ·σ·sqrt(q / V) + ε·q`
//!
//! The first term is the temporary impact of consuming `q` out of the
//! visible volume `V`; the second is the permanent, linear component.
//! The result is a fraction of price and is scaled by the notional.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use types::errors::EstimatorError;
use types::order::{OrderParameters, Side};

use super::{scale_by_notional, to_decimal};
use crate::order_book::OrderBookState;
use crate::rolling::RollingStatistics;

pub const DEFAULT_GAMMA: f64 = 1.5;
pub const DEFAULT_EPSILON: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketImpactEstimator {
    /// Temporary impact coefficient
    pub gamma: f64,
    /// Permanent impact coefficient
    pub epsilon: f64,
    /// Levels summed into the visible volume
    pub depth: usize,
}

impl MarketImpactEstimator {
    pub fn new(gamma: f64, epsilon: f64, depth: usize) -> Self {
        Self {
            gamma,
            epsilon,
            depth,
        }
    }

    /// Impact as a fraction of price.
    pub fn impact(&self, quantity: f64, volume: f64, volatility: f64) -> Result<f64, EstimatorError> {
        if volume <= 0.0 {
            return Err(EstimatorError::InsufficientLiquidity { depth: self.depth });
        }
        let impact = self.gamma * volatility * (quantity / volume).sqrt() + self.epsilon * quantity;
        if !impact.is_finite() {
            return Err(EstimatorError::NonFinite {
                model: "market_impact".to_string(),
            });
        }
        Ok(impact)
    }

    /// Visible volume the order would consume: asks for a buy, bids for a
    /// sell.
    pub fn visible_volume(&self, book: &OrderBookState, side: Side) -> Decimal {
        book.top_n_volume(side.opposite(), self.depth)
    }

    /// Impact cost in quote currency.
    pub fn estimate(
        &self,
        book: &OrderBookState,
        stats: &RollingStatistics,
        order: &OrderParameters,
    ) -> Result<Decimal, EstimatorError> {
        let volume = self.visible_volume(book, order.side);
        if volume.is_zero() {
            return Err(EstimatorError::InsufficientLiquidity { depth: self.depth });
        }
        let volatility = stats.volatility()?;
        let impact = self.impact(
            order.quantity.to_f64(),
            volume.to_f64().unwrap_or(0.0),
            volatility,
        )?;
        scale_by_notional(to_decimal(impact, "market_impact")?, order.notional_usd, "market_impact")
    }
}

impl Default for MarketImpactEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_GAMMA, DEFAULT_EPSILON, 10)
    }
}
