//! Error types for book maintenance and cost estimation
//!
//! Comprehensive error taxonomy using thiserror. Every variant is local to
//! one tick: callers omit the affected output and keep processing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::Side;

/// Decimal parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("Unparseable decimal: {0}")]
    Unparseable(String),

    #[error("Price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("Quantity must be non-negative, got {0}")]
    NegativeQuantity(Decimal),

    #[error("Notional must be positive, got {0}")]
    NonPositiveNotional(Decimal),
}

/// Order book state errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookError {
    #[error("No levels on {0:?} side")]
    EmptySide(Side),

    #[error("Insufficient depth: both sides need at least one level")]
    InsufficientDepth,

    #[error("Invalid level on {side:?} side: price {price}, volume {volume}")]
    InvalidLevel {
        side: Side,
        price: Decimal,
        volume: Decimal,
    },

    #[error("Crossed book: best bid {best_bid} >= best ask {best_ask}")]
    Crossed { best_bid: Decimal, best_ask: Decimal },
}

/// Cost estimator errors
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum EstimatorError {
    #[error("Insufficient liquidity: no volume in top {depth} levels")]
    InsufficientLiquidity { depth: usize },

    #[error("Insufficient samples: have {available}, need {required}")]
    InsufficientSamples { available: usize, required: usize },

    #[error("Insufficient depth for mid price")]
    InsufficientDepth,

    #[error("Unknown fee tier: {tier}")]
    UnknownFeeTier { tier: String },

    #[error("Maker probability unavailable")]
    MakerProbabilityUnavailable,

    #[error("Non-finite model output from {model}")]
    NonFinite { model: String },

    #[error("Feature vector length mismatch: expected {expected}, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("Decimal overflow in {model}")]
    Overflow { model: String },
}

/// Any book-side failure leaves an estimator without a usable top of book.
impl From<BookError> for EstimatorError {
    fn from(_: BookError) -> Self {
        EstimatorError::InsufficientDepth
    }
}
