//! Scan recording
//!
//! Per scan attempt:
//! resolving code -> (not found: `Ok(false)`) -> checking duplicate
//! -> (duplicate: `Ok(true)`, nothing written) -> appending event
//! (+ counting the visitor) -> `Ok(true)`.
//!
//! The duplicate check, the append and the counter increment share one
//! store write.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::{AppendOutcome, CodeStore};
use crate::error::StoreError;
use crate::model::{ScanEvent, ScanLocation};
use crate::visit::{ClientStore, VisitDeduplicator};

/// Events closer together than this are treated as one double submission
pub const DUPLICATE_WINDOW_MS: i64 = 1000;

/// Inputs of a single scan
#[derive(Debug, Clone, Default)]
pub struct ScanInput {
    pub code_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Explicit first-visit decision; when `None` the client's flags decide
    pub is_first_visit: Option<bool>,
    pub user_id: Option<String>,
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct ScanRecorder {
    store: Arc<dyn CodeStore>,
    clock: Clock,
}

impl ScanRecorder {
    pub fn new(store: Arc<dyn CodeStore>) -> Self {
        Self::with_clock(store, Arc::new(|| Utc::now().timestamp_millis()))
    }

    /// Recorder reading "now" (epoch milliseconds) from `clock`
    pub fn with_clock(store: Arc<dyn CodeStore>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Records a scan of `scan.code_id`.
    ///
    /// # Arguments
    ///
    /// * `scan` - code id, location and client details of the scan
    /// * `visits` - decides whether the scan counts as a new visitor when
    ///   `scan.is_first_visit` is `None`
    ///
    /// # Returns
    ///
    /// - `Ok(false)` - the code does not exist; nothing is written
    /// - `Ok(true)` - the event was stored, or recognised as a duplicate of
    ///   one stored within `DUPLICATE_WINDOW_MS`
    /// - `Err(_)` - the store failed; no retry is attempted
    pub async fn record_scan<S: ClientStore>(
        &self,
        scan: ScanInput,
        visits: &VisitDeduplicator<S>,
    ) -> Result<bool, StoreError> {
        if self.store.get(&scan.code_id).await?.is_none() {
            debug!("Scan for unknown code {}", scan.code_id);
            return Ok(false);
        }

        let count_visitor = scan
            .is_first_visit
            .unwrap_or_else(|| visits.is_first_visit(&scan.code_id));

        let event = ScanEvent {
            id: Uuid::new_v4().to_string(),
            qr_id: scan.code_id.clone(),
            timestamp: (self.clock)(),
            user_id: scan.user_id,
            location: ScanLocation {
                latitude: finite_or_zero(scan.latitude),
                longitude: finite_or_zero(scan.longitude),
                city: scan.city.filter(|c| !c.is_empty()),
                country: scan.country.filter(|c| !c.is_empty()),
            },
        };

        let outcome = self
            .store
            .append_scan(&scan.code_id, &event, count_visitor, DUPLICATE_WINDOW_MS)
            .await?;

        match outcome {
            AppendOutcome::Appended => {
                info!(
                    "Recorded scan {} for {} (new visitor: {})",
                    event.id, scan.code_id, count_visitor
                );
                Ok(true)
            }
            AppendOutcome::Duplicate => {
                debug!(
                    "Duplicate scan of {} within {}ms, ignoring",
                    scan.code_id, DUPLICATE_WINDOW_MS
                );
                Ok(true)
            }
            AppendOutcome::NotFound => Ok(false),
        }
    }
}

/// JSON cannot carry NaN or infinities, so they are stored as unknown
fn finite_or_zero(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}
