//! Latency instrumentation and pipeline counters
//!
//! `LatencyMonitor` keeps one fixed-capacity ring per metric. Rings are
//! boxed slices of `AtomicU64` holding `f64` bits plus an atomic write
//! cursor, so the pipeline task records without locking while any number
//! of readers compute aggregates through an `Arc`. A reader racing the
//! writer may see one slot from the previous lap; aggregates tolerate it.
//!
//! Metric names are registered up front. Recording to or reading from an
//! unregistered name is an error, never a silent insert.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Default samples retained per metric.
pub const DEFAULT_RING_CAPACITY: usize = 100;

/// Time spent inside the pipeline for one tick.
pub const PROCESSING_MS: &str = "processing_ms";
/// Exchange timestamp to emission.
pub const END_TO_END_MS: &str = "end_to_end_ms";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LatencyError {
    #[error("No samples recorded for {0}")]
    NoData(String),

    #[error("Unknown latency metric: {0}")]
    UnknownMetric(String),
}

/// Single-writer ring of `f64` samples.
#[derive(Debug)]
struct LatencyRing {
    slots: Box<[AtomicU64]>,
    /// Total samples ever written; the next slot is `written % capacity`.
    written: AtomicU64,
}

impl LatencyRing {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            written: AtomicU64::new(0),
        }
    }

    fn push(&self, value: f64) {
        let written = self.written.load(Ordering::Relaxed);
        let idx = (written % self.slots.len() as u64) as usize;
        self.slots[idx].store(value.to_bits(), Ordering::Relaxed);
        self.written.store(written + 1, Ordering::Release);
    }

    fn len(&self) -> usize {
        let written = self.written.load(Ordering::Acquire);
        written.min(self.slots.len() as u64) as usize
    }

    /// Retained samples in slot order.
    fn values(&self) -> Vec<f64> {
        let len = self.len();
        self.slots[..len]
            .iter()
            .map(|slot| f64::from_bits(slot.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Per-metric rolling latency aggregates.
#[derive(Debug)]
pub struct LatencyMonitor {
    rings: BTreeMap<String, LatencyRing>,
    capacity: usize,
}

impl LatencyMonitor {
    /// Monitor with no metrics registered.
    pub fn new(capacity: usize) -> Self {
        Self {
            rings: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Monitor with the two pipeline metrics registered.
    pub fn for_pipeline(capacity: usize) -> Self {
        Self::new(capacity).register(PROCESSING_MS).register(END_TO_END_MS)
    }

    /// Register a metric. Registration happens before the monitor is shared.
    pub fn register(mut self, name: &str) -> Self {
        let capacity = self.capacity;
        self.rings
            .entry(name.to_string())
            .or_insert_with(|| LatencyRing::new(capacity));
        self
    }

    fn ring(&self, name: &str) -> Result<&LatencyRing, LatencyError> {
        self.rings
            .get(name)
            .ok_or_else(|| LatencyError::UnknownMetric(name.to_string()))
    }

    fn samples(&self, name: &str) -> Result<Vec<f64>, LatencyError> {
        let values = self.ring(name)?.values();
        if values.is_empty() {
            return Err(LatencyError::NoData(name.to_string()));
        }
        Ok(values)
    }

    /// Append a sample, evicting the oldest once the ring is full.
    pub fn record(&self, name: &str, millis: f64) -> Result<(), LatencyError> {
        self.ring(name)?.push(millis);
        Ok(())
    }

    pub fn average(&self, name: &str) -> Result<f64, LatencyError> {
        let values = self.samples(name)?;
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    pub fn median(&self, name: &str) -> Result<f64, LatencyError> {
        self.percentile(name, 50.0)
    }

    /// Linearly interpolated percentile, `p` in `[0, 100]`.
    pub fn percentile(&self, name: &str, p: f64) -> Result<f64, LatencyError> {
        let mut values = self.samples(name)?;
        values.sort_by(|a, b| a.total_cmp(b));

        let rank = (p.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;
        Ok(values[lower] + (values[upper] - values[lower]) * weight)
    }

    /// Samples currently retained.
    pub fn count(&self, name: &str) -> Result<usize, LatencyError> {
        Ok(self.ring(name)?.len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.rings.keys().map(String::as_str)
    }
}

impl Default for LatencyMonitor {
    fn default() -> Self {
        Self::for_pipeline(DEFAULT_RING_CAPACITY)
    }
}

/// Event and tick counters for the pipeline.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub events_applied: AtomicU64,
    pub events_discarded: AtomicU64,
    pub ticks_emitted: AtomicU64,
    pub ticks_skipped: AtomicU64,
    pub anomalies: AtomicU64,
    pub budget_overruns: AtomicU64,
    pub resyncs: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Export counters as a BTreeMap for exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("events_applied".to_string(), self.events_applied.load(Ordering::Relaxed));
        m.insert("events_discarded".to_string(), self.events_discarded.load(Ordering::Relaxed));
        m.insert("ticks_emitted".to_string(), self.ticks_emitted.load(Ordering::Relaxed));
        m.insert("ticks_skipped".to_string(), self.ticks_skipped.load(Ordering::Relaxed));
        m.insert("anomalies".to_string(), self.anomalies.load(Ordering::Relaxed));
        m.insert("budget_overruns".to_string(), self.budget_overruns.load(Ordering::Relaxed));
        m.insert("resyncs".to_string(), self.resyncs.load(Ordering::Relaxed));
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ring_keeps_last_capacity_samples() {
        let monitor = LatencyMonitor::for_pipeline(100);
        for i in 1..=150 {
            monitor.record(PROCESSING_MS, i as f64).unwrap();
        }

        assert_eq!(monitor.count(PROCESSING_MS).unwrap(), 100);
        // Retained 51..=150
        assert_eq!(monitor.average(PROCESSING_MS).unwrap(), 100.5);
        assert_eq!(monitor.median(PROCESSING_MS).unwrap(), 100.5);
        assert_eq!(monitor.percentile(PROCESSING_MS, 0.0).unwrap(), 51.0);
        assert_eq!(monitor.percentile(PROCESSING_MS, 100.0).unwrap(), 150.0);
    }

    #[test]
    fn test_no_data() {
        let monitor = LatencyMonitor::default();
        assert_eq!(
            monitor.average(END_TO_END_MS),
            Err(LatencyError::NoData(END_TO_END_MS.to_string()))
        );
        assert!(monitor.median(END_TO_END_MS).is_err());
        assert_eq!(monitor.count(END_TO_END_MS).unwrap(), 0);
    }

    #[test]
    fn test_unknown_metric() {
        let monitor = LatencyMonitor::default();
        assert_eq!(
            monitor.record("gc_pause_ms", 1.0),
            Err(LatencyError::UnknownMetric("gc_pause_ms".to_string()))
        );
    }

    #[test]
    fn test_median_odd_and_even() {
        let monitor = LatencyMonitor::new(10).register("x");
        for v in [5.0, 1.0, 3.0] {
            monitor.record("x", v).unwrap();
        }
        assert_eq!(monitor.median("x").unwrap(), 3.0);

        monitor.record("x", 7.0).unwrap();
        assert_eq!(monitor.median("x").unwrap(), 4.0);
    }

    #[test]
    fn test_register_is_idempotent() {
        let monitor = LatencyMonitor::new(4).register("x").register("x");
        assert_eq!(monitor.metric_names().count(), 1);
    }

    #[test]
    fn test_shared_reader() {
        let monitor = Arc::new(LatencyMonitor::default());
        let reader = Arc::clone(&monitor);

        let writer = std::thread::spawn({
            let monitor = Arc::clone(&monitor);
            move || {
                for i in 0..1000 {
                    monitor.record(PROCESSING_MS, (i % 10) as f64).unwrap();
                }
            }
        });
        writer.join().unwrap();

        let avg = reader.average(PROCESSING_MS).unwrap();
        assert!((0.0..10.0).contains(&avg));
        assert_eq!(reader.count(PROCESSING_MS).unwrap(), 100);
    }

    #[test]
    fn test_counters_export() {
        let counters = PipelineCounters::new();
        PipelineCounters::incr(&counters.ticks_emitted);
        PipelineCounters::incr(&counters.ticks_emitted);
        PipelineCounters::incr(&counters.resyncs);

        let exported = counters.export();
        assert_eq!(exported["ticks_emitted"], 2);
        assert_eq!(exported["resyncs"], 1);
        assert_eq!(exported["anomalies"], 0);
        assert_eq!(exported.len(), 7);
    }
}
