//! Fee schedule types
//!
//! A fee schedule maps a tier name to its maker/taker rates. Rates are
//! fractions of notional (0.0005 = 0.05% = 5 bps); maker rates can be
//! negative (rebate).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee tier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTier {
    pub name: String,
    /// 30-day volume at which this tier starts; orders the schedule.
    pub volume_threshold: Decimal,
    /// Can be negative (rebate)
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
}

impl FeeTier {
    pub fn new(
        name: impl Into<String>,
        volume_threshold: Decimal,
        maker_rate: Decimal,
        taker_rate: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            volume_threshold,
            maker_rate,
            taker_rate,
        }
    }

    /// Both rates as `(maker, taker)`.
    pub fn rates(&self) -> (Decimal, Decimal) {
        (self.maker_rate, self.taker_rate)
    }
}

/// Ordered set of fee tiers, ascending by volume threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeSchedule {
    tiers: Vec<FeeTier>,
}

impl FeeSchedule {
    /// Build a schedule; tiers are sorted by volume threshold.
    pub fn new(mut tiers: Vec<FeeTier>) -> Self {
        tiers.sort_by(|a, b| a.volume_threshold.cmp(&b.volume_threshold));
        Self { tiers }
    }

    /// Look up a tier by name.
    pub fn get(&self, name: &str) -> Option<&FeeTier> {
        self.tiers.iter().find(|tier| tier.name == name)
    }

    pub fn tiers(&self) -> &[FeeTier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(default_fee_tiers())
    }
}

/// Standard spot fee tiers
pub fn default_fee_tiers() -> Vec<FeeTier> {
    vec![
        // < $1M volume
        FeeTier::new("VIP0", Decimal::ZERO, Decimal::new(8, 4), Decimal::new(10, 4)), // 0.08% / 0.10%
        // $1M - $10M
        FeeTier::new("VIP1", Decimal::from(1_000_000), Decimal::new(6, 4), Decimal::new(8, 4)),
        // $10M - $50M
        FeeTier::new("VIP2", Decimal::from(10_000_000), Decimal::new(2, 4), Decimal::new(5, 4)),
        // > $50M (maker rebate)
        FeeTier::new("VIP3", Decimal::from(50_000_000), Decimal::new(-5, 5), Decimal::new(35, 5)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_tier_rates() {
        let tier = FeeTier::new(
            "T",
            Decimal::ZERO,
            Decimal::from_str_exact("0.0002").unwrap(),
            Decimal::from_str_exact("0.0005").unwrap(),
        );

        let (maker, taker) = tier.rates();
        assert_eq!(maker, Decimal::new(2, 4));
        assert_eq!(taker, Decimal::new(5, 4));
    }

    #[test]
    fn test_maker_rebate() {
        let schedule = FeeSchedule::default();
        let (maker, _) = schedule.get("VIP3").unwrap().rates();
        assert!(maker.is_sign_negative()); // Negative = rebate
    }

    #[test]
    fn test_default_tiers() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.tiers().len(), 4);
        assert_eq!(schedule.tiers()[0].volume_threshold, Decimal::ZERO);
        assert_eq!(schedule.tiers()[3].volume_threshold, Decimal::from(50_000_000));
        assert!(schedule.get("VIP9").is_none());
    }

    #[test]
    fn test_schedule_sorted_on_construction() {
        let schedule = FeeSchedule::new(vec![
            FeeTier::new("B", Decimal::from(10), Decimal::ZERO, Decimal::ZERO),
            FeeTier::new("A", Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        ]);
        assert_eq!(schedule.tiers()[0].name, "A");
    }
}
