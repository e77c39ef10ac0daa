//! Pipeline orchestrator
//!
//! Single-consumer state machine driving one market's pipeline:
//!
//! ```text
//!  Disconnected ──Connected──▶ AwaitingSnapshot ──Snapshot──▶ Streaming
//!       ▲                            ▲                            │
//!       │                            └──Connected / seq gap───────┤
//!       └──────────────────────Disconnected───────────────────────┘
//! ```
//!
//! The orchestrator exclusively owns the book and the rolling statistics.
//! `handle` is synchronous; the async `run` loop only suspends on the
//! inbound channel and hands emitted updates to the latest-wins publisher.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::errors::BookError;
use types::ids::MarketId;
use types::order::OrderParameters;

use crate::config::{ConfigError, PipelineConfig};
use crate::events::{BookUpdateEvent, FeedMessage, LatencySample, MetricsUpdate, UpdateKind};
use crate::ingestion::{IngestionError, SequenceGuard};
use crate::metrics::{LatencyMonitor, PipelineCounters, END_TO_END_MS, PROCESSING_MS};
use crate::models::CostModelPipeline;
use crate::order_book::OrderBookState;
use crate::publisher::MetricsPublisher;
use crate::rolling::RollingStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    /// No transport; no book state.
    Disconnected,
    /// Subscribed; deltas are meaningless until a snapshot arrives.
    AwaitingSnapshot,
    /// Book mirrored; every applied event produces a tick.
    Streaming,
}

/// Why an inbound update was not applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    /// Update arrived without a live connection.
    NotConnected,
    /// Delta arrived before the first snapshot.
    AwaitingSnapshot,
    /// Rejected by sequencing or level validation.
    Ingestion(IngestionError),
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Event applied and a metrics update produced.
    Emitted(MetricsUpdate),
    /// Event applied but the book cannot be priced (empty side or crossed).
    Skipped(BookError),
    /// Event dropped; state untouched.
    Discarded(DiscardReason),
    /// Lifecycle transition.
    StateChanged(PipelineState),
    /// Sequence gap: book cleared, waiting for a fresh snapshot.
    ResyncRequired,
}

/// Drives one market's trade-cost pipeline.
#[derive(Debug)]
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    order: OrderParameters,
    state: PipelineState,
    book: OrderBookState,
    stats: RollingStatistics,
    models: CostModelPipeline,
    guard: SequenceGuard,
    latency: Arc<LatencyMonitor>,
    counters: Arc<PipelineCounters>,
    /// Metrics updates produced so far.
    tick: u64,
    /// Connection generation; bumped on every `Connected`.
    epoch: u64,
    last_valid_mid: Option<Decimal>,
}

impl PipelineOrchestrator {
    /// Build a pipeline with seeded fallback models.
    pub fn new(market: MarketId, order: OrderParameters, config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        validate_order(&order)?;
        let models = CostModelPipeline::from_config(&config);
        Ok(Self::with_models(market, order, config, models))
    }

    /// Build a pipeline around injected models. `config` must already be valid.
    pub fn with_models(
        market: MarketId,
        order: OrderParameters,
        config: PipelineConfig,
        models: CostModelPipeline,
    ) -> Self {
        info!(
            market = %market,
            window_secs = config.window_duration_secs,
            top_n_depth = config.top_n_depth,
            "PipelineOrchestrator initialized"
        );

        Self {
            book: OrderBookState::new(market),
            stats: RollingStatistics::new(config.window_duration()),
            latency: Arc::new(LatencyMonitor::for_pipeline(config.latency_ring_capacity)),
            counters: Arc::new(PipelineCounters::new()),
            config,
            order,
            state: PipelineState::Disconnected,
            models,
            guard: SequenceGuard::new(),
            tick: 0,
            epoch: 0,
            last_valid_mid: None,
        }
    }

    /// Handle one inbound message.
    pub fn handle(&mut self, msg: FeedMessage) -> TickOutcome {
        match msg {
            FeedMessage::Connected => self.on_connected(),
            FeedMessage::Disconnected => self.on_disconnected(),
            FeedMessage::Update(event) => self.on_update(event),
        }
    }

    fn on_connected(&mut self) -> TickOutcome {
        if self.state != PipelineState::Disconnected {
            info!(market = %self.book.symbol, state = ?self.state, "Resubscribed; clearing book state");
        }
        self.reset_owned_state();
        self.epoch += 1;
        self.state = PipelineState::AwaitingSnapshot;
        info!(market = %self.book.symbol, epoch = self.epoch, "Connected, awaiting snapshot");
        TickOutcome::StateChanged(self.state)
    }

    fn on_disconnected(&mut self) -> TickOutcome {
        self.reset_owned_state();
        self.state = PipelineState::Disconnected;
        warn!(market = %self.book.symbol, epoch = self.epoch, "Feed disconnected; book state cleared");
        TickOutcome::StateChanged(self.state)
    }

    fn on_update(&mut self, event: BookUpdateEvent) -> TickOutcome {
        let started = Instant::now();

        match (self.state, event.kind) {
            (PipelineState::Disconnected, _) => {
                PipelineCounters::incr(&self.counters.events_discarded);
                debug!(kind = event.kind_label(), "Update discarded: not connected");
                return TickOutcome::Discarded(DiscardReason::NotConnected);
            }
            (PipelineState::AwaitingSnapshot, UpdateKind::Delta) => {
                PipelineCounters::incr(&self.counters.events_discarded);
                PipelineCounters::incr(&self.counters.anomalies);
                warn!(
                    market = %self.book.symbol,
                    sequence = ?event.sequence,
                    "Book anomaly: delta before snapshot discarded"
                );
                return TickOutcome::Discarded(DiscardReason::AwaitingSnapshot);
            }
            _ => {}
        }

        // Levels are checked before the guard so a rejected delta never
        // consumes its sequence number.
        if event.kind == UpdateKind::Delta {
            if let Err(err) = OrderBookState::validate_delta(&event.bids, &event.asks) {
                return self.discard_malformed(err);
            }
        }

        match self.guard.admit(&event) {
            Ok(_) => {}
            Err(err) if err.is_droppable() => {
                PipelineCounters::incr(&self.counters.events_discarded);
                debug!(error = %err, "Update discarded by sequence guard");
                return TickOutcome::Discarded(DiscardReason::Ingestion(err));
            }
            Err(err) if self.config.resync_on_gap => {
                PipelineCounters::incr(&self.counters.resyncs);
                warn!(market = %self.book.symbol, error = %err, "Resyncing: awaiting fresh snapshot");
                self.reset_owned_state();
                self.state = PipelineState::AwaitingSnapshot;
                return TickOutcome::ResyncRequired;
            }
            Err(err) => {
                PipelineCounters::incr(&self.counters.anomalies);
                warn!(market = %self.book.symbol, error = %err, "Applying across sequence gap");
            }
        }

        match event.kind {
            UpdateKind::Snapshot => {
                let report = self.book.apply_snapshot(&event.bids, &event.asks, event.timestamp);
                if report.dropped > 0 {
                    PipelineCounters::incr(&self.counters.anomalies);
                }
                if self.state == PipelineState::AwaitingSnapshot {
                    self.state = PipelineState::Streaming;
                    info!(
                        market = %self.book.symbol,
                        levels = report.accepted,
                        "Snapshot applied, streaming"
                    );
                }
            }
            UpdateKind::Delta => {
                if let Err(err) = self.book.apply_delta(&event.bids, &event.asks, event.timestamp) {
                    return self.discard_malformed(err);
                }
            }
        }
        PipelineCounters::incr(&self.counters.events_applied);

        self.tick(event.timestamp, started)
    }

    fn discard_malformed(&self, err: BookError) -> TickOutcome {
        PipelineCounters::incr(&self.counters.events_discarded);
        PipelineCounters::incr(&self.counters.anomalies);
        warn!(market = %self.book.symbol, error = %err, "Book anomaly: malformed delta dropped");
        TickOutcome::Discarded(DiscardReason::Ingestion(err.into()))
    }

    /// Sample, evaluate and record one tick against the current book.
    fn tick(&mut self, timestamp: i64, started: Instant) -> TickOutcome {
        let priced = self
            .book
            .best_bid()
            .and(self.book.best_ask())
            .and_then(|_| self.book.check_crossed())
            .and_then(|_| self.book.mid_price());

        let mid_price = match priced {
            Ok(mid) => mid,
            Err(err) => {
                PipelineCounters::incr(&self.counters.ticks_skipped);
                if let BookError::Crossed { .. } = err {
                    PipelineCounters::incr(&self.counters.anomalies);
                    warn!(
                        market = %self.book.symbol,
                        error = %err,
                        last_valid_mid = ?self.last_valid_mid,
                        "Book anomaly: crossed book, tick skipped"
                    );
                } else {
                    debug!(market = %self.book.symbol, error = %err, "Tick skipped");
                }
                return TickOutcome::Skipped(err);
            }
        };

        self.stats.push(timestamp, mid_price);
        self.last_valid_mid = Some(mid_price);

        let cost_breakdown = self.models.evaluate(&self.book, &self.stats, &self.order);

        let processing_ms = started.elapsed().as_secs_f64() * 1000.0;
        let end_to_end_ms = Utc::now()
            .timestamp_nanos_opt()
            .map(|now| (now.saturating_sub(timestamp) as f64 / 1_000_000.0).max(0.0))
            .unwrap_or(0.0);
        self.record_latency(PROCESSING_MS, processing_ms);
        self.record_latency(END_TO_END_MS, end_to_end_ms);

        if processing_ms > self.config.max_tick_budget_ms {
            PipelineCounters::incr(&self.counters.budget_overruns);
            warn!(
                market = %self.book.symbol,
                processing_ms,
                budget_ms = self.config.max_tick_budget_ms,
                "Tick exceeded compute budget"
            );
        }

        self.tick += 1;
        PipelineCounters::incr(&self.counters.ticks_emitted);

        TickOutcome::Emitted(MetricsUpdate {
            market: self.book.symbol.clone(),
            tick: self.tick,
            epoch: self.epoch,
            timestamp,
            mid_price,
            cost_breakdown,
            latencies: LatencySample {
                processing_ms,
                end_to_end_ms,
            },
        })
    }

    fn record_latency(&self, metric: &str, millis: f64) {
        if let Err(err) = self.latency.record(metric, millis) {
            warn!(metric, error = %err, "Failed to record latency");
        }
    }

    fn reset_owned_state(&mut self) {
        self.book.clear();
        self.stats.clear();
        self.guard.reset();
        self.last_valid_mid = None;
    }

    /// Consume messages until the feed channel closes, publishing every
    /// emitted update.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<FeedMessage>, publisher: MetricsPublisher) {
        info!(market = %self.book.symbol, "Pipeline loop started");
        while let Some(msg) = rx.recv().await {
            if let TickOutcome::Emitted(update) = self.handle(msg) {
                publisher.publish(update);
            }
        }
        info!(
            market = %self.book.symbol,
            ticks = self.tick,
            published = publisher.published(),
            "Feed closed, pipeline loop finished"
        );
    }

    /// Run the loop on a tokio task. The orchestrator is handed back once
    /// the feed channel closes.
    pub fn spawn(mut self, rx: mpsc::Receiver<FeedMessage>, publisher: MetricsPublisher) -> JoinHandle<Self> {
        tokio::spawn(async move {
            self.run(rx, publisher).await;
            self
        })
    }

    /// Replace the order parameters used from the next tick on.
    pub fn set_order(&mut self, order: OrderParameters) -> Result<(), ConfigError> {
        validate_order(&order)?;
        self.order = order;
        Ok(())
    }

    pub fn order(&self) -> &OrderParameters {
        &self.order
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn book(&self) -> &OrderBookState {
        &self.book
    }

    pub fn stats(&self) -> &RollingStatistics {
        &self.stats
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn last_valid_mid(&self) -> Option<Decimal> {
        self.last_valid_mid
    }

    /// Checksum over the configured book depth.
    pub fn book_checksum(&self) -> String {
        self.book.checksum(self.config.checksum_depth)
    }

    /// Shared handle for latency readers.
    pub fn latency(&self) -> Arc<LatencyMonitor> {
        Arc::clone(&self.latency)
    }

    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn validate_order(order: &OrderParameters) -> Result<(), ConfigError> {
    order.validate().map_err(|err| ConfigError::Invalid {
        field: "notional_usd",
        reason: err.to_string(),
    })
}
