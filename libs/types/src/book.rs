//! Price level types shared by book producers and consumers

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::BookError;
use crate::numeric::{Price, Quantity};
use crate::order::Side;

/// A validated price level. A stored level always has `volume > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub volume: Quantity,
}

impl PriceLevel {
    pub fn new(price: Price, volume: Quantity) -> Self {
        Self { price, volume }
    }
}

/// A raw `(price, volume)` pair as delivered by the feed.
///
/// `volume == 0` means "remove this level".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub price: Decimal,
    pub volume: Decimal,
}

impl LevelUpdate {
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }

    /// Validate into a typed level; rejects `price <= 0` and `volume < 0`.
    pub fn validate(&self, side: Side) -> Result<PriceLevel, BookError> {
        let invalid = || BookError::InvalidLevel {
            side,
            price: self.price,
            volume: self.volume,
        };
        let price = Price::try_new(self.price).ok_or_else(invalid)?;
        let volume = Quantity::try_new(self.volume).ok_or_else(invalid)?;
        Ok(PriceLevel::new(price, volume))
    }
}

impl From<(u64, u64)> for LevelUpdate {
    fn from((price, volume): (u64, u64)) -> Self {
        Self::new(Decimal::from(price), Decimal::from(volume))
    }
}

impl From<(Decimal, Decimal)> for LevelUpdate {
    fn from((price, volume): (Decimal, Decimal)) -> Self {
        Self::new(price, volume)
    }
}
