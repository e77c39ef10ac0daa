//! Trade-cost estimation models
//!
//! Four independent estimators read the order book, rolling statistics and
//! the order parameters:
//!
//! - `slippage`: linear median quantile regression over book depth
//! - `impact`: Almgren–Chriss temporary + permanent impact
//! - `maker_taker`: logistic maker probability
//! - `fee`: fee-tier lookup weighted by maker probability
//!
//! `CostModelPipeline::evaluate` runs all four. A failing estimator only
//! removes its own field from the breakdown; nothing is ever substituted.
//! Scaling by notional and summing use checked `Decimal` arithmetic, so an
//! oversized order surfaces as `EstimatorError::Overflow` instead of a panic.
//!
//! Learned models sit behind the `SlippageModel` / `MakerTakerModel`
//! traits so pre-trained weights can be injected. Without injected weights
//! the pipeline fits a seeded fallback on synthetic data (`synthetic`),
//! which is reproducible bit for bit.

pub mod fee;
pub mod impact;
pub mod maker_taker;
pub mod slippage;
pub mod synthetic;

use std::fmt;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use types::errors::EstimatorError;
use types::order::OrderParameters;

use crate::config::PipelineConfig;
use crate::order_book::OrderBookState;
use crate::rolling::RollingStatistics;

pub use fee::FeeEstimator;
pub use impact::MarketImpactEstimator;
pub use maker_taker::{LogisticModel, MakerTakerEstimator};
pub use slippage::{LinearQuantileModel, SlippageEstimator};

/// Inference contract of a slippage regressor.
pub trait SlippageModel: Send + Sync + fmt::Debug {
    /// Predicted slippage as a fraction of notional.
    fn predict(&self, features: &[f64]) -> Result<f64, EstimatorError>;

    /// Expected feature vector length.
    fn feature_count(&self) -> usize;
}

/// Inference contract of a maker/taker classifier.
pub trait MakerTakerModel: Send + Sync + fmt::Debug {
    /// Raw probability that the order executes as maker. May fall outside
    /// `[0, 1]`; the estimator clamps it.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, EstimatorError>;
}

/// Which cost field an estimator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    Slippage,
    MarketImpact,
    MakerTaker,
    Fee,
    /// Sum of the three costs.
    Total,
}

/// An estimator that produced no value this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentFailure {
    pub component: CostComponent,
    pub error: EstimatorError,
}

/// Per-tick cost estimates in quote currency. Absent fields failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Predicted slippage as a fraction of notional.
    pub slippage_pct: Option<f64>,
    pub slippage_cost: Option<Decimal>,
    pub impact_cost: Option<Decimal>,
    pub fee_cost: Option<Decimal>,
    /// Present only when all three costs are present.
    pub total_cost: Option<Decimal>,
    pub maker_probability: Option<f64>,
    pub failures: Vec<ComponentFailure>,
}

impl CostBreakdown {
    /// Whether every estimator produced a value.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure recorded for `component`, if any.
    pub fn failure(&self, component: CostComponent) -> Option<&EstimatorError> {
        self.failures
            .iter()
            .find(|f| f.component == component)
            .map(|f| &f.error)
    }

    fn record<T>(&mut self, component: CostComponent, result: Result<T, EstimatorError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                debug!(?component, %error, "Estimator produced no value");
                self.failures.push(ComponentFailure { component, error });
                None
            }
        }
    }
}

/// Convert a model output to `Decimal`, rejecting NaN and infinities.
pub(crate) fn to_decimal(value: f64, model: &str) -> Result<Decimal, EstimatorError> {
    if !value.is_finite() {
        return Err(EstimatorError::NonFinite {
            model: model.to_string(),
        });
    }
    Decimal::from_f64(value).ok_or_else(|| EstimatorError::NonFinite {
        model: model.to_string(),
    })
}

/// `value × notional`, or `Overflow` when the product leaves `Decimal` range.
pub(crate) fn scale_by_notional(value: Decimal, notional: Decimal, model: &str) -> Result<Decimal, EstimatorError> {
    value
        .checked_mul(notional)
        .ok_or_else(|| EstimatorError::Overflow {
            model: model.to_string(),
        })
}

/// Runs the four estimators for one tick.
#[derive(Debug)]
pub struct CostModelPipeline {
    pub slippage: SlippageEstimator,
    pub impact: MarketImpactEstimator,
    pub maker_taker: MakerTakerEstimator,
    pub fee: FeeEstimator,
}

impl CostModelPipeline {
    pub fn new(
        slippage: SlippageEstimator,
        impact: MarketImpactEstimator,
        maker_taker: MakerTakerEstimator,
        fee: FeeEstimator,
    ) -> Self {
        Self {
            slippage,
            impact,
            maker_taker,
            fee,
        }
    }

    /// Pipeline with seeded fallback models and the configured constants.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            SlippageEstimator::fallback(config.top_n_depth, config.model_seed),
            MarketImpactEstimator::new(config.gamma, config.epsilon, config.top_n_depth),
            MakerTakerEstimator::fallback(config.top_n_depth, config.model_seed),
            FeeEstimator::new(config.fee_schedule.clone()),
        )
    }

    /// Replace the slippage model with pre-trained weights.
    pub fn with_slippage_model(mut self, model: Box<dyn SlippageModel>) -> Self {
        self.slippage = SlippageEstimator::new(model, self.slippage.depth());
        self
    }

    /// Replace the maker/taker model with pre-trained weights.
    pub fn with_maker_taker_model(mut self, model: Box<dyn MakerTakerModel>) -> Self {
        self.maker_taker = MakerTakerEstimator::new(model, self.maker_taker.depth());
        self
    }

    /// Evaluate all estimators. Never fails as a whole.
    pub fn evaluate(
        &self,
        book: &OrderBookState,
        stats: &RollingStatistics,
        order: &OrderParameters,
    ) -> CostBreakdown {
        let mut breakdown = CostBreakdown::default();

        if let Some(estimate) =
            breakdown.record(CostComponent::Slippage, self.slippage.estimate(book, order))
        {
            breakdown.slippage_pct = Some(estimate.slippage_pct);
            breakdown.slippage_cost = Some(estimate.cost);
        }

        breakdown.impact_cost =
            breakdown.record(CostComponent::MarketImpact, self.impact.estimate(book, stats, order));

        breakdown.maker_probability =
            breakdown.record(CostComponent::MakerTaker, self.maker_taker.estimate(book, order));

        let fee = match breakdown.maker_probability {
            Some(p_maker) => self.fee.fee_cost(&order.fee_tier, p_maker, order.notional_usd),
            None => Err(EstimatorError::MakerProbabilityUnavailable),
        };
        breakdown.fee_cost = breakdown.record(CostComponent::Fee, fee);

        breakdown.total_cost = match (breakdown.slippage_cost, breakdown.impact_cost, breakdown.fee_cost) {
            (Some(slippage), Some(impact), Some(fee)) => {
                let total = slippage
                    .checked_add(impact)
                    .and_then(|sum| sum.checked_add(fee))
                    .ok_or_else(|| EstimatorError::Overflow {
                        model: "total".to_string(),
                    });
                breakdown.record(CostComponent::Total, total)
            }
            _ => None,
        };

        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use types::book::LevelUpdate;
    use types::fee::{FeeSchedule, FeeTier};
    use types::ids::MarketId;
    use types::numeric::Quantity;
    use types::order::Side;

    const SEC: i64 = 1_000_000_000;

    fn book() -> OrderBookState {
        let mut book = OrderBookState::new(MarketId::new("BTC/USDT"));
        let bids: Vec<LevelUpdate> = (0..12).map(|i| LevelUpdate::from((100 - i, 2))).collect();
        let asks: Vec<LevelUpdate> = (0..12).map(|i| LevelUpdate::from((101 + i, 2))).collect();
        book.apply_snapshot(&bids, &asks, 0);
        book
    }

    fn stats_with(prices: &[i64]) -> RollingStatistics {
        let mut stats = RollingStatistics::new(Duration::from_secs(60));
        for (i, p) in prices.iter().enumerate() {
            stats.push(i as i64 * SEC, Decimal::from(*p));
        }
        stats
    }

    fn order(tier: &str) -> OrderParameters {
        OrderParameters::market(
            Side::BUY,
            "1".parse::<Quantity>().unwrap(),
            Decimal::from(101),
            tier,
        )
    }

    fn pipeline() -> CostModelPipeline {
        CostModelPipeline::from_config(&PipelineConfig::default())
    }

    #[test]
    fn test_complete_breakdown() {
        let breakdown = pipeline().evaluate(&book(), &stats_with(&[100, 101, 100]), &order("VIP0"));

        assert!(breakdown.is_complete(), "failures: {:?}", breakdown.failures);
        let total = breakdown.slippage_cost.unwrap()
            + breakdown.impact_cost.unwrap()
            + breakdown.fee_cost.unwrap();
        assert_eq!(breakdown.total_cost, Some(total));
        let p = breakdown.maker_probability.unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_missing_volatility_only_drops_impact() {
        let breakdown = pipeline().evaluate(&book(), &stats_with(&[100]), &order("VIP0"));

        assert!(breakdown.impact_cost.is_none());
        assert!(matches!(
            breakdown.failure(CostComponent::MarketImpact),
            Some(EstimatorError::InsufficientSamples { .. })
        ));
        assert!(breakdown.slippage_cost.is_some());
        assert!(breakdown.fee_cost.is_some());
        assert!(breakdown.total_cost.is_none());
    }

    #[test]
    fn test_unknown_tier_only_drops_fee() {
        let breakdown = pipeline().evaluate(&book(), &stats_with(&[100, 101]), &order("GOLD"));

        assert!(breakdown.fee_cost.is_none());
        assert_eq!(
            breakdown.failure(CostComponent::Fee),
            Some(&EstimatorError::UnknownFeeTier {
                tier: "GOLD".to_string()
            })
        );
        assert!(breakdown.maker_probability.is_some());
        assert!(breakdown.impact_cost.is_some());
        assert!(breakdown.total_cost.is_none());
    }

    #[derive(Debug)]
    struct BrokenClassifier;

    impl MakerTakerModel for BrokenClassifier {
        fn predict_proba(&self, _features: &[f64]) -> Result<f64, EstimatorError> {
            Ok(f64::NAN)
        }
    }

    #[test]
    fn test_missing_maker_probability_omits_fee() {
        let pipeline = pipeline().with_maker_taker_model(Box::new(BrokenClassifier));
        let breakdown = pipeline.evaluate(&book(), &stats_with(&[100, 101]), &order("VIP0"));

        assert!(breakdown.maker_probability.is_none());
        assert_eq!(
            breakdown.failure(CostComponent::Fee),
            Some(&EstimatorError::MakerProbabilityUnavailable)
        );
        assert!(breakdown.slippage_cost.is_some());
    }

    #[test]
    fn test_injected_slippage_model() {
        let depth = 10;
        let model = LinearQuantileModel::new(0.5, 0.001, vec![0.0; 2 * depth + 1]);
        let pipeline = pipeline().with_slippage_model(Box::new(model));
        let breakdown = pipeline.evaluate(&book(), &stats_with(&[100, 101]), &order("VIP0"));

        assert_eq!(breakdown.slippage_pct, Some(0.001));
        assert_eq!(breakdown.slippage_cost, Some(Decimal::new(101, 3))); // 0.001 * 101
    }

    #[test]
    fn test_fee_uses_schedule_rates() {
        let schedule = FeeSchedule::new(vec![FeeTier::new(
            "FLAT",
            Decimal::ZERO,
            Decimal::new(1, 3),
            Decimal::new(1, 3),
        )]);
        let mut pipeline = pipeline();
        pipeline.fee = FeeEstimator::new(schedule);

        let mut order = order("FLAT");
        order.notional_usd = Decimal::from(1000);
        let breakdown = pipeline.evaluate(&book(), &stats_with(&[100, 101]), &order);

        // Equal rates: fee independent of maker probability
        assert_eq!(breakdown.fee_cost.unwrap().round_dp(10), Decimal::ONE);
    }

    /// Pipeline whose slippage, impact and fee all scale to `rate × notional`.
    fn pipeline_with_unit_rate(rate: i64) -> CostModelPipeline {
        let model = LinearQuantileModel::new(0.5, rate as f64, vec![0.0; 21]);
        let mut pipeline = pipeline().with_slippage_model(Box::new(model));
        pipeline.impact = MarketImpactEstimator::new(0.0, rate as f64, 10);
        pipeline.fee = FeeEstimator::new(FeeSchedule::new(vec![FeeTier::new(
            "FLAT",
            Decimal::ZERO,
            Decimal::from(rate),
            Decimal::from(rate),
        )]));
        pipeline
    }

    #[test]
    fn test_oversized_notional_reports_overflow() {
        let mut order = order("FLAT");
        order.notional_usd = Decimal::MAX;
        let breakdown = pipeline_with_unit_rate(2).evaluate(&book(), &stats_with(&[100, 101]), &order);

        for component in [CostComponent::Slippage, CostComponent::MarketImpact, CostComponent::Fee] {
            assert!(
                matches!(breakdown.failure(component), Some(EstimatorError::Overflow { .. })),
                "{component:?}: {:?}",
                breakdown.failures
            );
        }
        assert!(breakdown.slippage_cost.is_none());
        assert!(breakdown.total_cost.is_none());
        assert!(breakdown.maker_probability.is_some());
    }

    #[test]
    fn test_total_overflow_omits_total_only() {
        // Each cost equals the notional; three halves of MAX overflow the sum
        let mut order = order("FLAT");
        order.notional_usd = Decimal::MAX / Decimal::from(2);
        let breakdown = pipeline_with_unit_rate(1).evaluate(&book(), &stats_with(&[100, 101]), &order);

        assert!(breakdown.slippage_cost.is_some());
        assert!(breakdown.impact_cost.is_some());
        assert!(breakdown.fee_cost.is_some());
        assert!(breakdown.total_cost.is_none());
        assert_eq!(
            breakdown.failure(CostComponent::Total),
            Some(&EstimatorError::Overflow {
                model: "total".to_string()
            })
        );
    }

    #[test]
    fn test_to_decimal_rejects_nan() {
        assert!(to_decimal(f64::NAN, "test").is_err());
        assert!(to_decimal(f64::INFINITY, "test").is_err());
        assert_eq!(to_decimal(0.25, "test").unwrap(), Decimal::new(25, 2));
    }
}
