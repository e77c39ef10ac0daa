//! Latest-wins delivery of metrics updates
//!
//! The pipeline must never wait on the presentation layer. Updates go
//! through a single-slot `tokio::sync::watch` channel: publishing
//! overwrites the slot and never blocks, and a slow subscriber simply
//! observes the newest update when it next looks. Skipped updates are
//! visible to the subscriber as gaps in `MetricsUpdate::tick`.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::trace;

use crate::events::MetricsUpdate;

/// Producer half, owned by the orchestrator.
#[derive(Debug)]
pub struct MetricsPublisher {
    tx: watch::Sender<Option<MetricsUpdate>>,
    published: AtomicU64,
}

/// Consumer half. Cloneable; every clone sees the same slot.
#[derive(Debug, Clone)]
pub struct MetricsSubscriber {
    rx: watch::Receiver<Option<MetricsUpdate>>,
}

/// Create a connected publisher/subscriber pair with an empty slot.
pub fn channel() -> (MetricsPublisher, MetricsSubscriber) {
    let (tx, rx) = watch::channel(None);
    (
        MetricsPublisher {
            tx,
            published: AtomicU64::new(0),
        },
        MetricsSubscriber { rx },
    )
}

impl MetricsPublisher {
    /// Overwrite the slot with `update`. Succeeds with or without
    /// subscribers.
    pub fn publish(&self, update: MetricsUpdate) {
        trace!(tick = update.tick, epoch = update.epoch, "Publishing metrics update");
        self.tx.send_replace(Some(update));
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Another subscriber on the same slot.
    pub fn subscribe(&self) -> MetricsSubscriber {
        MetricsSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Updates published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl MetricsSubscriber {
    /// Wait for an update newer than the last one seen. Returns `None` once
    /// the publisher is gone.
    pub async fn next(&mut self) -> Option<MetricsUpdate> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(update) = self.rx.borrow_and_update().clone() {
                return Some(update);
            }
        }
    }

    /// The newest update without waiting, if any was published.
    pub fn latest(&self) -> Option<MetricsUpdate> {
        self.rx.borrow().clone()
    }
}
