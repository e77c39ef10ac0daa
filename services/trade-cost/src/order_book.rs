//! In-memory order book state
//!
//! Maintains a mirrored L2 book from feed snapshots and deltas.
//! Uses `BTreeMap` keyed by price so every per-level update is O(log n)
//! and iteration is always in sorted order.
//! All arithmetic uses `Decimal`.
//!
//! The book processes:
//! - Snapshot → both ladders replaced; malformed levels dropped
//! - Delta → per level insert/overwrite, or remove when volume is zero
//!
//! A stored level never has zero volume.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use types::book::{LevelUpdate, PriceLevel};
use types::errors::BookError;
use types::ids::MarketId;
use types::numeric::{Price, Quantity};
use types::order::Side;

/// Counts from applying a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotReport {
    /// Levels stored.
    pub accepted: usize,
    /// Malformed levels dropped.
    pub dropped: usize,
}

/// In-memory order book mirror for a single symbol.
///
/// Bids iterate in descending price order (best bid first).
/// Asks iterate in ascending price order (best ask first).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookState {
    /// Trading pair symbol.
    pub symbol: MarketId,
    /// Bid levels: price → volume (BTreeMap sorts ascending, we reverse for best-bid-first).
    bids: BTreeMap<Price, Quantity>,
    /// Ask levels: price → volume (ascending = best ask first).
    asks: BTreeMap<Price, Quantity>,
    /// Exchange timestamp of the last applied update.
    last_update: Option<i64>,
}

impl OrderBookState {
    /// Create an empty order book for the given symbol.
    pub fn new(symbol: MarketId) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update: None,
        }
    }

    /// Replace both ladders entirely.
    ///
    /// Duplicated prices keep their last occurrence, zero-volume levels are
    /// skipped, and malformed levels are dropped and logged. Never fails.
    pub fn apply_snapshot(
        &mut self,
        bids: &[LevelUpdate],
        asks: &[LevelUpdate],
        timestamp: i64,
    ) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        self.bids = Self::build_side(&self.symbol, Side::BUY, bids, &mut report);
        self.asks = Self::build_side(&self.symbol, Side::SELL, asks, &mut report);
        self.last_update = Some(timestamp);

        debug!(
            symbol = %self.symbol,
            bid_levels = self.bids.len(),
            ask_levels = self.asks.len(),
            dropped = report.dropped,
            "Snapshot applied"
        );
        report
    }

    fn build_side(
        symbol: &MarketId,
        side: Side,
        levels: &[LevelUpdate],
        report: &mut SnapshotReport,
    ) -> BTreeMap<Price, Quantity> {
        let mut ladder = BTreeMap::new();
        for update in levels {
            match update.validate(side) {
                Ok(level) if level.volume.is_zero() => {
                    ladder.remove(&level.price);
                }
                Ok(level) => {
                    ladder.insert(level.price, level.volume);
                }
                Err(err) => {
                    report.dropped += 1;
                    warn!(%symbol, error = %err, "Book anomaly: dropping malformed snapshot level");
                }
            }
        }
        report.accepted += ladder.len();
        ladder
    }

    /// Apply an incremental update.
    ///
    /// Every pair is validated before anything is mutated, so a malformed
    /// pair rejects the whole delta and leaves the book untouched.
    /// Returns the number of pairs applied.
    pub fn apply_delta(
        &mut self,
        bids: &[LevelUpdate],
        asks: &[LevelUpdate],
        timestamp: i64,
    ) -> Result<usize, BookError> {
        let (bid_levels, ask_levels) = Self::validate_delta(bids, asks)?;

        for level in &bid_levels {
            Self::upsert(&mut self.bids, level);
        }
        for level in &ask_levels {
            Self::upsert(&mut self.asks, level);
        }
        self.last_update = Some(timestamp);

        Ok(bid_levels.len() + ask_levels.len())
    }

    /// Validate every pair of a delta without touching any book.
    pub fn validate_delta(
        bids: &[LevelUpdate],
        asks: &[LevelUpdate],
    ) -> Result<(Vec<PriceLevel>, Vec<PriceLevel>), BookError> {
        Ok((validate_all(Side::BUY, bids)?, validate_all(Side::SELL, asks)?))
    }

    fn upsert(ladder: &mut BTreeMap<Price, Quantity>, level: &PriceLevel) {
        if level.volume.is_zero() {
            ladder.remove(&level.price);
        } else {
            ladder.insert(level.price, level.volume);
        }
    }

    /// Drop all levels (reconnect / resubscribe).
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_update = None;
    }

    /// Get the current best bid level.
    pub fn best_bid(&self) -> Result<PriceLevel, BookError> {
        // Best bid = highest price in bids (last in BTreeMap)
        self.bids
            .iter()
            .next_back()
            .map(|(price, volume)| PriceLevel::new(*price, *volume))
            .ok_or(BookError::EmptySide(Side::BUY))
    }

    /// Get the current best ask level.
    pub fn best_ask(&self) -> Result<PriceLevel, BookError> {
        // Best ask = lowest price in asks (first in BTreeMap)
        self.asks
            .iter()
            .next()
            .map(|(price, volume)| PriceLevel::new(*price, *volume))
            .ok_or(BookError::EmptySide(Side::SELL))
    }

    /// Get the mid-market price (average of best bid and best ask).
    pub fn mid_price(&self) -> Result<Decimal, BookError> {
        match (self.best_bid(), self.best_ask()) {
            (Ok(bid), Ok(ask)) => {
                Ok((bid.price.as_decimal() + ask.price.as_decimal()) / Decimal::from(2))
            }
            _ => Err(BookError::InsufficientDepth),
        }
    }

    /// Get the spread between best ask and best bid.
    pub fn spread(&self) -> Result<Decimal, BookError> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Ok(ask.price.as_decimal() - bid.price.as_decimal())
    }

    /// Whether the best bid is at or through the best ask.
    ///
    /// A book with an empty side is never crossed.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Ok(bid), Ok(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    /// `BookError::Crossed` when the book is crossed.
    pub fn check_crossed(&self) -> Result<(), BookError> {
        match (self.best_bid(), self.best_ask()) {
            (Ok(bid), Ok(ask)) if bid.price >= ask.price => Err(BookError::Crossed {
                best_bid: bid.price.as_decimal(),
                best_ask: ask.price.as_decimal(),
            }),
            _ => Ok(()),
        }
    }

    /// Up to `n` levels of one side in priority order (best first).
    pub fn top_n(&self, side: Side, n: usize) -> Vec<PriceLevel> {
        let to_level = |(price, volume): (&Price, &Quantity)| PriceLevel::new(*price, *volume);
        match side {
            Side::BUY => self.bids.iter().rev().take(n).map(to_level).collect(),
            Side::SELL => self.asks.iter().take(n).map(to_level).collect(),
        }
    }

    /// Total volume over the top `n` levels of one side.
    pub fn top_n_volume(&self, side: Side, n: usize) -> Decimal {
        match side {
            Side::BUY => self.bids.values().rev().take(n).map(|q| q.as_decimal()).sum(),
            Side::SELL => self.asks.values().take(n).map(|q| q.as_decimal()).sum(),
        }
    }

    /// Number of price levels on one side.
    pub fn depth(&self, side: Side) -> usize {
        match side {
            Side::BUY => self.bids.len(),
            Side::SELL => self.asks.len(),
        }
    }

    /// Whether both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Exchange timestamp of the last applied update.
    pub fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    /// SHA-256 over the top `depth` levels of both sides.
    ///
    /// Two books with the same visible depth produce the same checksum,
    /// independent of how they were built.
    pub fn checksum(&self, depth: usize) -> String {
        let mut hasher = Sha256::new();
        for level in self.top_n(Side::BUY, depth) {
            hasher.update(level_key("b", &level));
        }
        for level in self.top_n(Side::SELL, depth) {
            hasher.update(level_key("a", &level));
        }
        format!("{:x}", hasher.finalize())
    }
}

fn level_key(tag: &str, level: &PriceLevel) -> String {
    format!(
        "{}:{}:{};",
        tag,
        level.price.as_decimal().normalize(),
        level.volume.as_decimal().normalize()
    )
}

fn validate_all(side: Side, levels: &[LevelUpdate]) -> Result<Vec<PriceLevel>, BookError> {
    levels.iter().map(|update| update.validate(side)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_book() -> OrderBookState {
        OrderBookState::new(MarketId::new("BTC/USDT"))
    }

    fn levels(pairs: &[(u64, u64)]) -> Vec<LevelUpdate> {
        pairs.iter().copied().map(LevelUpdate::from).collect()
    }

    fn seeded_book() -> OrderBookState {
        let mut book = make_book();
        book.apply_snapshot(
            &levels(&[(100, 1), (99, 2)]),
            &levels(&[(101, 1), (102, 2)]),
            1,
        );
        book
    }

    #[test]
    fn test_empty_book() {
        let book = make_book();
        assert_eq!(book.depth(Side::BUY), 0);
        assert_eq!(book.depth(Side::SELL), 0);
        assert_eq!(book.best_bid(), Err(BookError::EmptySide(Side::BUY)));
        assert_eq!(book.best_ask(), Err(BookError::EmptySide(Side::SELL)));
        assert_eq!(book.mid_price(), Err(BookError::InsufficientDepth));
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_snapshot_mid_price() {
        let book = seeded_book();
        assert_eq!(book.mid_price().unwrap(), Decimal::new(1005, 1)); // 100.5
        assert_eq!(book.spread().unwrap(), Decimal::ONE);
        assert_eq!(book.best_bid().unwrap().price, Price::from_u64(100).unwrap());
        assert_eq!(book.best_ask().unwrap().price, Price::from_u64(101).unwrap());
    }

    #[test]
    fn test_snapshot_sorts_and_dedups() {
        let mut book = make_book();
        book.apply_snapshot(
            &levels(&[(98, 1), (100, 1), (99, 2), (100, 5)]),
            &levels(&[(103, 1), (101, 1), (102, 2)]),
            1,
        );

        let bids = book.top_n(Side::BUY, 10);
        assert_eq!(bids.len(), 3);
        assert_eq!(bids[0].price, Price::from_u64(100).unwrap());
        assert_eq!(bids[0].volume, Quantity::try_new(Decimal::from(5)).unwrap());
        assert!(bids.windows(2).all(|w| w[0].price > w[1].price));

        let asks = book.top_n(Side::SELL, 10);
        assert!(asks.windows(2).all(|w| w[0].price < w[1].price));
    }

    #[test]
    fn test_snapshot_drops_malformed_levels() {
        let mut book = make_book();
        let bids = vec![
            LevelUpdate::from((100, 1)),
            LevelUpdate::new(Decimal::from(99), Decimal::from(-3)),
            LevelUpdate::new(Decimal::ZERO, Decimal::ONE),
        ];
        let report = book.apply_snapshot(&bids, &levels(&[(101, 1), (105, 0)]), 1);

        assert_eq!(report.dropped, 2);
        assert_eq!(report.accepted, 2);
        assert_eq!(book.depth(Side::BUY), 1);
        // Zero volume is absent, not malformed
        assert_eq!(book.depth(Side::SELL), 1);
    }

    #[test]
    fn test_snapshot_replaces_previous_state() {
        let mut book = seeded_book();
        book.apply_snapshot(&levels(&[(50, 1)]), &levels(&[(51, 1)]), 2);

        assert_eq!(book.depth(Side::BUY), 1);
        assert_eq!(book.best_bid().unwrap().price, Price::from_u64(50).unwrap());
        assert_eq!(book.last_update(), Some(2));
    }

    #[test]
    fn test_snapshot_idempotent() {
        let bids = levels(&[(100, 1), (99, 2)]);
        let asks = levels(&[(101, 1), (102, 2)]);

        let mut once = make_book();
        once.apply_snapshot(&bids, &asks, 1);

        let mut twice = make_book();
        twice.apply_snapshot(&bids, &asks, 1);
        twice.apply_snapshot(&bids, &asks, 1);

        assert_eq!(once, twice);
        assert_eq!(once.checksum(10), twice.checksum(10));
    }

    #[test]
    fn test_delta_insert_overwrite_remove() {
        let mut book = seeded_book();

        let applied = book
            .apply_delta(&levels(&[(100, 7), (99, 0), (97, 1)]), &levels(&[(101, 0)]), 2)
            .unwrap();
        assert_eq!(applied, 4);

        let bids = book.top_n(Side::BUY, 10);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].volume, Quantity::try_new(Decimal::from(7)).unwrap());
        assert_eq!(bids[1].price, Price::from_u64(97).unwrap());
        assert_eq!(book.best_ask().unwrap().price, Price::from_u64(102).unwrap());
    }

    #[test]
    fn test_remove_absent_level_is_noop() {
        let mut book = seeded_book();
        let before = book.clone();

        book.apply_delta(&levels(&[(42, 0)]), &levels(&[(999, 0)]), 1).unwrap();

        assert_eq!(book, before);
    }

    #[test]
    fn test_malformed_delta_leaves_book_untouched() {
        let mut book = seeded_book();
        let before = book.clone();

        let bids = vec![
            LevelUpdate::from((100, 9)),
            LevelUpdate::new(Decimal::from(98), Decimal::from(-1)),
        ];
        let result = book.apply_delta(&bids, &[], 2);

        assert!(matches!(result, Err(BookError::InvalidLevel { .. })));
        assert_eq!(book, before);
    }

    #[test]
    fn test_crossed_detection() {
        let mut book = seeded_book();
        assert!(!book.is_crossed());
        assert!(book.check_crossed().is_ok());

        book.apply_delta(&levels(&[(101, 1)]), &[], 2).unwrap();
        assert!(book.is_crossed());
        assert!(matches!(book.check_crossed(), Err(BookError::Crossed { .. })));
    }

    #[test]
    fn test_top_n_shallow_side() {
        let book = seeded_book();
        assert_eq!(book.top_n(Side::BUY, 10).len(), 2);
        assert_eq!(book.top_n(Side::SELL, 1).len(), 1);
        assert!(book.top_n(Side::SELL, 0).is_empty());
    }

    #[test]
    fn test_top_n_volume() {
        let book = seeded_book();
        assert_eq!(book.top_n_volume(Side::BUY, 10), Decimal::from(3));
        assert_eq!(book.top_n_volume(Side::SELL, 1), Decimal::ONE);
    }

    #[test]
    fn test_clear() {
        let mut book = seeded_book();
        book.clear();
        assert!(book.is_empty());
        assert_eq!(book.last_update(), None);
    }

    #[test]
    fn test_checksum_ignores_volume_scale() {
        let mut a = make_book();
        a.apply_snapshot(&levels(&[(100, 1)]), &levels(&[(101, 1)]), 1);

        let mut b = make_book();
        b.apply_snapshot(
            &[LevelUpdate::new(Decimal::from(100), Decimal::new(100, 2))],
            &[LevelUpdate::new(Decimal::from(101), Decimal::new(10, 1))],
            1,
        );

        assert_eq!(a.checksum(5), b.checksum(5));
    }
}
