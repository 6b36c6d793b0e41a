//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: can be reconstructed from the event stream
//! - **Idempotent**: safe for at-least-once delivery (per-stream cursors)

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use shopforge_core::AggregateId;
use shopforge_events::EventEnvelope;

pub mod catalog;
pub mod orders;
pub mod sales;
pub mod stock_levels;

pub use catalog::{CatalogEntry, CatalogPage, CatalogProjection, CatalogQuery, CatalogSort};
pub use orders::{OrderReadModel, OrdersProjection};
pub use sales::{SaleReadModel, SalesProjection, SalesTotals};
pub use stock_levels::{MovementEntry, StockLevelRow, StockLevelsProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("event does not belong to this stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-stream sequence cursors shared by every projection.
///
/// Applies the cursor discipline for at-least-once delivery:
/// - `seq == 0` is invalid (stores assign from 1)
/// - `seq <= cursor` is a duplicate or replay and is skipped
/// - after the first event of a stream, gaps are an error
///
/// The write lock is held across the apply closure, so check, apply, and
/// advance are one atomic step per stream.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `apply` iff the envelope advances its stream cursor.
    ///
    /// Returns `Ok(())` without applying for duplicates/replays.
    pub(crate) fn apply_guarded(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        if let Ok(mut cursors) = self.inner.write() {
            let key = envelope.aggregate_id();
            let seq = envelope.sequence_number();
            let last = *cursors.get(&key).unwrap_or(&0);

            if seq == 0 {
                return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            // The first event of a stream may land at any positive sequence
            // (a projection can come up mid-stream); after that, strict +1.
            if seq != last + 1 && last != 0 {
                return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
            }

            apply()?;

            // Advance cursor only after a successful apply.
            cursors.insert(key, seq);
        }

        Ok(())
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

/// Deterministic replay order for rebuilds: aggregate, then sequence.
pub(crate) fn sort_for_replay(envs: &mut [EventEnvelope<JsonValue>]) {
    envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));
}
