//! Order-side and order-parameter types
//!
//! `OrderParameters` describes the hypothetical order being costed. It is
//! supplied by the caller and stays immutable for the duration of one tick.

use serde::{Deserialize, Serialize};

use rust_decimal::Decimal;

use crate::errors::NumericError;
use crate::numeric::{Price, Quantity};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    BUY,
    /// Sell order (ask)
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// Parameters of the order whose execution cost is estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParameters {
    pub side: Side,
    /// Order size in base-asset units.
    pub quantity: Quantity,
    /// Order size in quote (USD) terms.
    pub notional_usd: Decimal,
    /// Fee tier name looked up in the fee schedule.
    pub fee_tier: String,
    /// Limit price; `None` for a market order.
    #[serde(default)]
    pub limit_price: Option<Price>,
}

impl OrderParameters {
    /// Market order with the given size.
    pub fn market(
        side: Side,
        quantity: Quantity,
        notional_usd: Decimal,
        fee_tier: impl Into<String>,
    ) -> Self {
        Self {
            side,
            quantity,
            notional_usd,
            fee_tier: fee_tier.into(),
            limit_price: None,
        }
    }

    /// Turn this into a limit order at `price`.
    pub fn with_limit(mut self, price: Price) -> Self {
        self.limit_price = Some(price);
        self
    }

    pub fn is_market(&self) -> bool {
        self.limit_price.is_none()
    }

    /// Reject a non-positive notional.
    pub fn validate(&self) -> Result<(), NumericError> {
        if self.notional_usd <= Decimal::ZERO {
            return Err(NumericError::NonPositiveNotional(self.notional_usd));
        }
        Ok(())
    }
}
