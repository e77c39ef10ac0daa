//! Expected exchange fee
//!
//! `fee = p·maker_rate·N + (1 - p)·taker_rate·N` where `p` is the maker
//! probability and `N` the notional. Every product is checked; an
//! overflow is reported rather than panicking.

use rust_decimal::Decimal;
use types::errors::EstimatorError;
use types::fee::{FeeSchedule, FeeTier};

use super::{scale_by_notional, to_decimal};

#[derive(Debug, Clone, Default)]
pub struct FeeEstimator {
    schedule: FeeSchedule,
}

impl FeeEstimator {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    pub fn tier(&self, name: &str) -> Result<&FeeTier, EstimatorError> {
        self.schedule
            .get(name)
            .ok_or_else(|| EstimatorError::UnknownFeeTier {
                tier: name.to_string(),
            })
    }

    /// Probability-weighted fee in quote currency.
    pub fn fee_cost(&self, tier: &str, p_maker: f64, notional: Decimal) -> Result<Decimal, EstimatorError> {
        let (maker_rate, taker_rate) = self.tier(tier)?.rates();
        let p = to_decimal(p_maker.clamp(0.0, 1.0), "fee")?;
        let maker_fee = scale_by_notional(maker_rate, notional, "fee")?;
        let taker_fee = scale_by_notional(taker_rate, notional, "fee")?;
        p.checked_mul(maker_fee)
            .zip((Decimal::ONE - p).checked_mul(taker_fee))
            .and_then(|(maker, taker)| maker.checked_add(taker))
            .ok_or_else(|| EstimatorError::Overflow {
                model: "fee".to_string(),
            })
    }
}
