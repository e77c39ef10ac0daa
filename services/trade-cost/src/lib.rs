//! Trade-Cost Service
//!
//! Consumes a real-time order-book feed and produces, on every update:
//! - A mirrored L2 order book
//! - Realized volatility over a rolling mid-price window
//! - Expected slippage, market impact and fee for a configured order
//! - Per-tick processing and end-to-end latencies
//!
//! # Architecture
//!
//! ```text
//!      FeedMessage (mpsc)
//!            │
//!     ┌──────▼───────┐
//!     │ Orchestrator │  ← lifecycle, sequence guard
//!     └──────┬───────┘
//!            │
//!   ┌────────┼──────────┐
//!   │        │          │
//! ┌─▼──┐ ┌───▼────┐ ┌───▼───┐
//! │Book│ │Rolling │ │Latency│
//! └─┬──┘ └───┬────┘ └───┬───┘
//!   │        │          │
//! ┌─▼────────▼──┐       │
//! │ Cost models │       │
//! └──────┬──────┘       │
//!        │              │
//! ┌──────▼──────────────▼─────┐
//! │  MetricsUpdate (watch)    │
//! └───────────────────────────┘
//! ```

pub mod config;
pub mod events;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod order_book;
pub mod publisher;
pub mod rolling;

pub use config::{ConfigError, PipelineConfig};
pub use events::{BookUpdateEvent, FeedMessage, MetricsUpdate};
pub use orchestrator::{PipelineOrchestrator, PipelineState, TickOutcome};

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
