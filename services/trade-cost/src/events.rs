//! Inbound and outbound event definitions for the trade-cost pipeline
//!
//! Inbound: `FeedMessage` carries lifecycle signals and parsed book updates
//! from the feed collaborator. Outbound: `MetricsUpdate` carries one tick's
//! cost breakdown and latencies to the presentation collaborator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::book::LevelUpdate;
use types::ids::MarketId;

use crate::models::CostBreakdown;

/// Whether an update replaces the book or patches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Snapshot,
    Delta,
}

/// A parsed order-book update from the feed.
///
/// Levels use the "volume 0 = remove" convention. The event is owned by the
/// orchestrator only while it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdateEvent {
    pub kind: UpdateKind,
    pub bids: Vec<LevelUpdate>,
    pub asks: Vec<LevelUpdate>,
    /// Unix nanoseconds timestamp from the exchange clock
    pub timestamp: i64,
    /// Exchange update id, when the venue provides one
    #[serde(default)]
    pub sequence: Option<u64>,
}

impl BookUpdateEvent {
    pub fn snapshot(bids: Vec<LevelUpdate>, asks: Vec<LevelUpdate>, timestamp: i64) -> Self {
        Self {
            kind: UpdateKind::Snapshot,
            bids,
            asks,
            timestamp,
            sequence: None,
        }
    }

    pub fn delta(bids: Vec<LevelUpdate>, asks: Vec<LevelUpdate>, timestamp: i64) -> Self {
        Self {
            kind: UpdateKind::Delta,
            bids,
            asks,
            timestamp,
            sequence: None,
        }
    }

    /// Attach an exchange sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Get the event type as a string label for logging.
    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            UpdateKind::Snapshot => "Snapshot",
            UpdateKind::Delta => "Delta",
        }
    }

    /// Total number of level pairs carried.
    pub fn level_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}

/// Everything the feed collaborator can deliver to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FeedMessage {
    /// Transport (re)connected and subscribed.
    Connected,
    /// Transport lost; all book-derived state is invalid.
    Disconnected,
    /// A parsed book update.
    Update(BookUpdateEvent),
}

impl FeedMessage {
    pub fn label(&self) -> &'static str {
        match self {
            FeedMessage::Connected => "Connected",
            FeedMessage::Disconnected => "Disconnected",
            FeedMessage::Update(event) => event.kind_label(),
        }
    }
}

/// Per-tick latencies in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatencySample {
    /// Time spent inside the pipeline for this tick.
    pub processing_ms: f64,
    /// Exchange timestamp to emission.
    pub end_to_end_ms: f64,
}

/// One tick's output for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsUpdate {
    pub market: MarketId,
    /// Per-pipeline tick counter; gaps mean the consumer missed updates.
    pub tick: u64,
    /// Connection generation the tick belongs to.
    pub epoch: u64,
    /// Exchange timestamp of the event that produced this tick.
    pub timestamp: i64,
    pub mid_price: Decimal,
    pub cost_breakdown: CostBreakdown,
    pub latencies: LatencySample,
}
