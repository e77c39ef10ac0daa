//! Event ingestion guard
//!
//! Enforces sequencing for venues that tag book updates with an update id:
//! - Stale and duplicate deltas are dropped
//! - A gap between consecutive deltas invalidates the mirrored book
//! - A snapshot resets the baseline
//!
//! Events without a sequence number pass through unchecked.

use tracing::{debug, warn};
use types::errors::BookError;

use crate::events::{BookUpdateEvent, UpdateKind};

/// Errors that can occur during event ingestion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestionError {
    #[error("duplicate event: sequence {0} already applied")]
    Duplicate(u64),

    #[error("stale event: last={last}, received={received}")]
    Stale { last: u64, received: u64 },

    #[error("sequence gap detected: expected {expected}, got {actual}")]
    Gap { expected: u64, actual: u64 },

    #[error("malformed update: {0}")]
    Malformed(#[from] BookError),
}

impl IngestionError {
    /// Whether the event can simply be dropped with the book left intact.
    pub fn is_droppable(&self) -> bool {
        !matches!(self, IngestionError::Gap { .. })
    }
}

/// Outcome of an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Sequence checked and advanced.
    InSequence,
    /// No sequence number carried.
    Unsequenced,
}

/// Tracks the last applied sequence number.
#[derive(Debug, Default)]
pub struct SequenceGuard {
    last_sequence: Option<u64>,
    events_accepted: u64,
    events_dropped: u64,
    gaps_detected: u64,
}

impl SequenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check an event against the last applied sequence.
    ///
    /// On a gap the baseline still advances to the received sequence, so a
    /// caller that tolerates gaps can keep applying.
    pub fn admit(&mut self, event: &BookUpdateEvent) -> Result<Admission, IngestionError> {
        let Some(seq) = event.sequence else {
            self.events_accepted += 1;
            return Ok(Admission::Unsequenced);
        };

        if event.kind == UpdateKind::Snapshot {
            debug!(sequence = seq, "Sequence baseline reset by snapshot");
            self.last_sequence = Some(seq);
            self.events_accepted += 1;
            return Ok(Admission::InSequence);
        }

        match self.last_sequence {
            Some(last) if seq == last => {
                self.events_dropped += 1;
                debug!(sequence = seq, "Duplicate delta dropped");
                Err(IngestionError::Duplicate(seq))
            }
            Some(last) if seq < last => {
                self.events_dropped += 1;
                debug!(last, received = seq, "Stale delta dropped");
                Err(IngestionError::Stale {
                    last,
                    received: seq,
                })
            }
            Some(last) if seq > last + 1 => {
                self.gaps_detected += 1;
                self.last_sequence = Some(seq);
                warn!(
                    expected = last + 1,
                    actual = seq,
                    missing = seq - last - 1,
                    "Sequence gap detected"
                );
                Err(IngestionError::Gap {
                    expected: last + 1,
                    actual: seq,
                })
            }
            _ => {
                self.last_sequence = Some(seq);
                self.events_accepted += 1;
                Ok(Admission::InSequence)
            }
        }
    }

    /// Forget the baseline (reconnect or resync).
    pub fn reset(&mut self) {
        self.last_sequence = None;
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn events_accepted(&self) -> u64 {
        self.events_accepted
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped
    }

    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }
}
