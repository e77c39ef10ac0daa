//! Types library for the trade-cost engine
//!
//! Core type definitions shared by every pipeline crate, keeping price and
//! volume arithmetic deterministic and validated at the boundary.
//!
//! # Modules
//! - `ids`: Instrument identifiers (MarketId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `book`: Price levels and raw level updates
//! - `order`: Order side and order parameters
//! - `fee`: Fee tiers and schedules
//! - `errors`: Error taxonomy

pub mod book;
pub mod errors;
pub mod fee;
pub mod ids;
pub mod numeric;
pub mod order;
