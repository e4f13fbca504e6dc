//! Replay progress tracking

use crate::replay::ReplayTimestamp;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Replay stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStage {
    /// Rescanning the chain
    Scanning,
    /// Complete
    Complete,
}

impl ReplayStage {
    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scanning => "Replaying Chain",
            Self::Complete => "Replayed",
        }
    }
}

/// Shared progress tracker for one replay scan.
///
/// The scan engine writes through it; UI readers poll snapshots. Cheap to
/// clone.
#[derive(Clone)]
pub struct ReplayProgress {
    inner: Arc<RwLock<ProgressInner>>,
}

struct ProgressInner {
    earliest: ReplayTimestamp,
    target: Option<DateTime<Utc>>,
    scanned_through: Option<DateTime<Utc>>,
    stage: ReplayStage,
    requests_merged: u32,
}

impl ReplayProgress {
    /// Create a tracker for a scan starting from `earliest`.
    pub fn new(earliest: ReplayTimestamp) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ProgressInner {
                earliest,
                target: None,
                scanned_through: None,
                stage: ReplayStage::Scanning,
                requests_merged: 0,
            })),
        }
    }

    /// Set the scan's target time (usually the chain tip time).
    pub fn set_target(&self, target: DateTime<Utc>) {
        self.inner.write().target = Some(target);
    }

    /// Record how far the engine has scanned.
    pub fn set_scanned_through(&self, time: DateTime<Utc>) {
        self.inner.write().scanned_through = Some(time);
    }

    /// Count a merged request folded into this scan's window.
    pub fn record_merge(&self) {
        self.inner.write().requests_merged += 1;
    }

    /// Mark the scan complete.
    pub fn complete(&self) {
        let mut inner = self.inner.write();
        inner.stage = ReplayStage::Complete;
        inner.scanned_through = inner.target;
    }

    /// Current stage.
    pub fn stage(&self) -> ReplayStage {
        self.inner.read().stage
    }

    /// Whether the scan finished.
    pub fn is_complete(&self) -> bool {
        self.inner.read().stage == ReplayStage::Complete
    }

    /// Scan window start.
    pub fn earliest(&self) -> ReplayTimestamp {
        self.inner.read().earliest
    }

    /// Number of requests merged into this scan while it ran.
    pub fn requests_merged(&self) -> u32 {
        self.inner.read().requests_merged
    }

    /// Percentage of the time window scanned, 0-100.
    pub fn percentage(&self) -> f64 {
        let inner = self.inner.read();
        if inner.stage == ReplayStage::Complete {
            return 100.0;
        }
        let (target, scanned) = match (inner.target, inner.scanned_through) {
            (Some(t), Some(s)) => (t, s),
            _ => return 0.0,
        };
        let start = match inner.earliest {
            ReplayTimestamp::At(t) => t,
            ReplayTimestamp::Genesis => DateTime::<Utc>::UNIX_EPOCH,
        };
        let total = (target - start).num_seconds();
        if total <= 0 {
            return 100.0;
        }
        let done = (scanned - start).num_seconds().clamp(0, total);
        (done as f64 / total as f64) * 100.0
    }

    /// Get summary string
    pub fn summary(&self) -> String {
        let inner = self.inner.read();
        let from = match inner.earliest {
            ReplayTimestamp::Genesis => "genesis".to_string(),
            ReplayTimestamp::At(t) => t.to_rfc3339(),
        };
        drop(inner);
        format!(
            "{} | from {} | {:.1}%",
            self.stage().name(),
            from,
            self.percentage()
        )
    }
}
