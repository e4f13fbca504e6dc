//! Replay scheduling and merging
//!
//! The scheduler owns the queuing/merging policy only; the scan itself is
//! delegated to an external engine that is not safe for concurrent
//! invocation over the same wallet. State machine per wallet set:
//! Idle -> Scanning -> Idle, with a pending merged request folded in while
//! a scan is in flight.

use crate::handle::WalletId;
use crate::progress::ReplayProgress;
use crate::replay::ReplayRequest;
use crate::supersede::SupersededFlag;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// External chain-scan engine.
///
/// A long-running call the scheduler invokes and does not reimplement.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Rescan the chain for the requested wallets from the requested point.
    ///
    /// Implementations must check `superseded` between work units and may
    /// return early once it is raised; the flag is only raised when a wider
    /// follow-up scan is already queued, so no history is lost by yielding.
    async fn scan(
        &self,
        request: ReplayRequest,
        progress: ReplayProgress,
        superseded: SupersededFlag,
    ) -> Result<()>;
}

/// How the scheduler disposed of an offered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// No overlapping scan was active; a new scan started immediately.
    Started,
    /// An overlapping scan is in flight; the request was absorbed by it,
    /// either as already covered or merged into its pending follow-up.
    Merged,
}

struct ActiveScan {
    /// The request the engine is running right now.
    request: ReplayRequest,
    /// Follow-up merged from the running request and everything offered
    /// since; always spans the running window, so yielding to it never
    /// loses history.
    pending: Option<ReplayRequest>,
    flag: SupersededFlag,
    progress: ReplayProgress,
}

impl ActiveScan {
    fn new(request: ReplayRequest, flag: SupersededFlag, progress: ReplayProgress) -> Self {
        Self {
            request,
            pending: None,
            flag,
            progress,
        }
    }

    fn overlaps(&self, request: &ReplayRequest) -> bool {
        request.overlaps(&self.request.wallets)
            || self
                .pending
                .as_ref()
                .map(|pending| request.overlaps(&pending.wallets))
                .unwrap_or(false)
    }

    fn involves(&self, wallet: &WalletId) -> bool {
        self.request.wallets.contains(wallet)
            || self
                .pending
                .as_ref()
                .map(|pending| pending.wallets.contains(wallet))
                .unwrap_or(false)
    }

    /// Absorb an offered request.
    ///
    /// A request the running window already spans needs nothing; anything
    /// wider goes into the pending slot seeded from the running request, and
    /// the superseded flag is raised so the engine may yield to it.
    fn fold(&mut self, request: ReplayRequest) {
        self.progress.record_merge();
        match self.pending.take() {
            Some(pending) => {
                self.pending = Some(pending.merge(request));
                self.flag.raise();
            }
            None => {
                if self.request.covers(&request) {
                    return;
                }
                self.pending = Some(self.request.clone().merge(request));
                self.flag.raise();
            }
        }
    }
}

struct SchedulerInner {
    engine: Arc<dyn ScanEngine>,
    scans: Mutex<HashMap<Uuid, ActiveScan>>,
}

/// Accepts replay requests and hands merged requests to the scan engine one
/// at a time per wallet.
#[derive(Clone)]
pub struct ReplayScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReplayScheduler {
    /// Create a scheduler over the given engine.
    pub fn new(engine: Arc<dyn ScanEngine>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                engine,
                scans: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Offer a replay request.
    ///
    /// Starts a scan immediately when no active scan overlaps the request's
    /// wallets; otherwise the overlapping scan absorbs it. Must be called
    /// from within a tokio runtime.
    pub fn offer(&self, request: ReplayRequest) -> OfferOutcome {
        let mut scans = self.inner.scans.lock();

        if let Some((id, scan)) = scans.iter_mut().find(|(_, scan)| scan.overlaps(&request)) {
            scan.fold(request);
            debug!(
                scan = %id,
                widenings = scan.flag.times_widened(),
                "Absorbed replay request into in-flight scan"
            );
            return OfferOutcome::Merged;
        }

        let id = Uuid::new_v4();
        let flag = SupersededFlag::new();
        let progress = ReplayProgress::new(request.earliest);
        scans.insert(
            id,
            ActiveScan::new(request.clone(), flag.clone(), progress.clone()),
        );
        drop(scans);

        info!(scan = %id, wallets = request.wallets.len(), "Starting replay scan");
        let inner = self.inner.clone();
        tokio::spawn(run_scan(inner, id, request, flag, progress));
        OfferOutcome::Started
    }

    /// Whether a scan is active for the given wallet.
    pub fn is_scanning(&self, wallet: &WalletId) -> bool {
        self.inner
            .scans
            .lock()
            .values()
            .any(|scan| scan.involves(wallet))
    }

    /// Progress tracker for the wallet's active scan, if any.
    pub fn progress_for(&self, wallet: &WalletId) -> Option<ReplayProgress> {
        self.inner
            .scans
            .lock()
            .values()
            .find(|scan| scan.involves(wallet))
            .map(|scan| scan.progress.clone())
    }
}

/// Run one scan, then chain any pending merged request until the wallet set
/// goes idle or the follow-up belongs to another active scan.
async fn run_scan(
    inner: Arc<SchedulerInner>,
    id: Uuid,
    mut request: ReplayRequest,
    mut flag: SupersededFlag,
    mut progress: ReplayProgress,
) {
    loop {
        if let Err(e) = inner
            .engine
            .scan(request.clone(), progress.clone(), flag.clone())
            .await
        {
            // A scan fault does not corrupt wallet state; the engine's own
            // reporting surfaces it. The scheduler moves on.
            warn!(scan = %id, error = %e, "Replay scan failed");
        }

        let next = {
            let mut scans = inner.scans.lock();
            let pending = scans.get_mut(&id).and_then(|scan| scan.pending.take());
            match pending {
                None => {
                    progress.complete();
                    scans.remove(&id);
                    None
                }
                Some(merged) => {
                    scans.remove(&id);
                    // Another scan may have started since this one did; a
                    // follow-up overlapping it must not invoke the engine in
                    // parallel over shared wallets, so hand it over instead.
                    if let Some((other_id, other)) =
                        scans.iter_mut().find(|(_, scan)| scan.overlaps(&merged))
                    {
                        other.fold(merged);
                        debug!(
                            scan = %id,
                            into = %other_id,
                            "Handed follow-up to overlapping active scan"
                        );
                        progress.complete();
                        None
                    } else {
                        let next_flag = SupersededFlag::new();
                        let next_progress = ReplayProgress::new(merged.earliest);
                        scans.insert(
                            id,
                            ActiveScan::new(
                                merged.clone(),
                                next_flag.clone(),
                                next_progress.clone(),
                            ),
                        );
                        Some((merged, next_flag, next_progress))
                    }
                }
            }
        };

        match next {
            Some((merged, next_flag, next_progress)) => {
                info!(scan = %id, "Starting merged replay scan");
                request = merged;
                flag = next_flag;
                progress = next_progress;
            }
            None => {
                info!(scan = %id, "Replay scan complete for this wallet set");
                break;
            }
        }
    }
}
