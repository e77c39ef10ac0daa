//! Maker/taker classification
//!
//! Estimates the probability that an order rests on the book and fills as
//! maker. Two features:
//!
//! - aggressiveness: where the limit price sits inside the spread, 0 at the
//!   own-side touch and 1 at the far touch. Market orders are 1.
//! - size: quantity relative to the visible volume it would consume.
//!
//! Both are clamped to `[0, 1]`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::errors::EstimatorError;
use types::order::{OrderParameters, Side};

use super::synthetic::{dot, fit_logistic, maker_taker_dataset, sigmoid};
use super::MakerTakerModel;
use crate::order_book::OrderBookState;

pub const FEATURE_COUNT: usize = 2;

/// Binary logistic classifier weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LogisticModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    /// Classifier fitted on the seeded synthetic dataset.
    pub fn fallback(seed: u64) -> Self {
        let (intercept, coefficients) = fit_logistic(&maker_taker_dataset(seed));
        Self::new(intercept, coefficients)
    }
}

impl MakerTakerModel for LogisticModel {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, EstimatorError> {
        if features.len() != self.coefficients.len() {
            return Err(EstimatorError::FeatureMismatch {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        Ok(sigmoid(self.intercept + dot(&self.coefficients, features)))
    }
}

#[derive(Debug)]
pub struct MakerTakerEstimator {
    model: Box<dyn MakerTakerModel>,
    depth: usize,
}

impl MakerTakerEstimator {
    pub fn new(model: Box<dyn MakerTakerModel>, depth: usize) -> Self {
        Self { model, depth }
    }

    pub fn fallback(depth: usize, seed: u64) -> Self {
        Self::new(Box::new(LogisticModel::fallback(seed)), depth)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// `[aggressiveness, size]` for the order against the current book.
    pub fn features(
        &self,
        book: &OrderBookState,
        order: &OrderParameters,
    ) -> Result<[f64; FEATURE_COUNT], EstimatorError> {
        let bid = book.best_bid()?.price.as_decimal();
        let ask = book.best_ask()?.price.as_decimal();

        let aggressiveness = match order.limit_price {
            None => 1.0,
            Some(limit) => {
                let limit = limit.as_decimal();
                let spread = ask - bid;
                let position = if spread > Decimal::ZERO {
                    match order.side {
                        Side::BUY => (limit - bid) / spread,
                        Side::SELL => (ask - limit) / spread,
                    }
                } else {
                    // Locked or crossed: only prices at the far touch take
                    let takes = match order.side {
                        Side::BUY => limit >= ask,
                        Side::SELL => limit <= bid,
                    };
                    if takes {
                        Decimal::ONE
                    } else {
                        Decimal::ZERO
                    }
                };
                clamp_unit(position.to_f64().unwrap_or(1.0))
            }
        };

        let volume = book.top_n_volume(order.side.opposite(), self.depth);
        let size = if volume > Decimal::ZERO {
            clamp_unit((order.quantity.as_decimal() / volume).to_f64().unwrap_or(1.0))
        } else {
            1.0
        };

        Ok([aggressiveness, size])
    }

    /// Probability of a maker fill, clamped to `[0, 1]`.
    pub fn estimate(&self, book: &OrderBookState, order: &OrderParameters) -> Result<f64, EstimatorError> {
        let features = self.features(book, order)?;
        let p_maker = self.model.predict_proba(&features)?;
        if !p_maker.is_finite() {
            return Err(EstimatorError::NonFinite {
                model: "maker_taker".to_string(),
            });
        }
        Ok(clamp_unit(p_maker))
    }
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::book::LevelUpdate;
    use types::ids::MarketId;
    use types::numeric::{Price, Quantity};

    fn book() -> OrderBookState {
        let mut book = OrderBookState::new(MarketId::new("BTC/USDT"));
        book.apply_snapshot(
            &[LevelUpdate::from((100, 4))],
            &[LevelUpdate::from((104, 2)), LevelUpdate::from((105, 2))],
            0,
        );
        book
    }

    fn estimator() -> MakerTakerEstimator {
        MakerTakerEstimator::fallback(10, 42)
    }

    fn buy(quantity: &str) -> OrderParameters {
        OrderParameters::market(
            Side::BUY,
            quantity.parse::<Quantity>().unwrap(),
            Decimal::from(1000),
            "VIP0",
        )
    }

    #[test]
    fn test_market_order_fully_aggressive() {
        let features = estimator().features(&book(), &buy("1")).unwrap();
        assert_eq!(features, [1.0, 0.25]);
    }

    #[test]
    fn test_limit_inside_spread() {
        let order = buy("1").with_limit(Price::from_u64(101).unwrap());
        let features = estimator().features(&book(), &order).unwrap();
        assert_eq!(features[0], 0.25);

        let sell = OrderParameters {
            side: Side::SELL,
            ..buy("2")
        }
        .with_limit(Price::from_u64(103).unwrap());
        let features = estimator().features(&book(), &sell).unwrap();
        assert_eq!(features, [0.25, 0.5]);
    }

    #[test]
    fn test_features_clamped() {
        let passive = buy("100").with_limit(Price::from_u64(90).unwrap());
        assert_eq!(estimator().features(&book(), &passive).unwrap(), [0.0, 1.0]);

        let through = buy("1").with_limit(Price::from_u64(200).unwrap());
        assert_eq!(estimator().features(&book(), &through).unwrap()[0], 1.0);
    }

    #[test]
    fn test_empty_side_is_insufficient_depth() {
        let book = OrderBookState::new(MarketId::new("BTC/USDT"));
        assert_eq!(
            estimator().estimate(&book, &buy("1")),
            Err(EstimatorError::InsufficientDepth)
        );
    }

    #[test]
    fn test_passive_orders_more_likely_maker() {
        let estimator = estimator();
        let passive = estimator
            .estimate(&book(), &buy("0.1").with_limit(Price::from_u64(100).unwrap()))
            .unwrap();
        let aggressive = estimator.estimate(&book(), &buy("0.1")).unwrap();
        assert!((0.0..=1.0).contains(&passive));
        assert!(passive > aggressive);
    }

    #[derive(Debug)]
    struct Overconfident;

    impl MakerTakerModel for Overconfident {
        fn predict_proba(&self, _features: &[f64]) -> Result<f64, EstimatorError> {
            Ok(1.7)
        }
    }

    #[test]
    fn test_output_clamped() {
        let estimator = MakerTakerEstimator::new(Box::new(Overconfident), 10);
        assert_eq!(estimator.estimate(&book(), &buy("1")).unwrap(), 1.0);
    }

    #[test]
    fn test_fallback_deterministic() {
        assert_eq!(LogisticModel::fallback(42), LogisticModel::fallback(42));
    }
}
