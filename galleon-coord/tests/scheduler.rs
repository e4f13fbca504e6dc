//! Replay scheduler queuing/merging policy tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use galleon_coord::{
    OfferOutcome, ReplayProgress, ReplayRequest, ReplayScheduler, ReplayTimestamp, Result,
    ScanEngine, SupersededFlag, WalletId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn ts(year: i32) -> ReplayTimestamp {
    ReplayTimestamp::At(Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap())
}

fn wallet(name: &str) -> WalletId {
    WalletId::new(format!("/wallets/{name}.wallet"))
}

struct BlockingEngine {
    scans: Mutex<Vec<(ReplayRequest, SupersededFlag)>>,
    permits: Semaphore,
}

impl BlockingEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            scans: Mutex::new(Vec::new()),
            permits: Semaphore::new(0),
        })
    }

    fn scan_count(&self) -> usize {
        self.scans.lock().len()
    }

    fn request(&self, index: usize) -> ReplayRequest {
        self.scans.lock()[index].0.clone()
    }

    fn flag(&self, index: usize) -> SupersededFlag {
        self.scans.lock()[index].1.clone()
    }
}

#[async_trait]
impl ScanEngine for BlockingEngine {
    async fn scan(
        &self,
        request: ReplayRequest,
        _progress: ReplayProgress,
        superseded: SupersededFlag,
    ) -> Result<()> {
        self.scans.lock().push((request, superseded));
        self.permits.acquire().await.unwrap().forget();
        Ok(())
    }
}

/// Engine that records every request, counts invocations whose wallet sets
/// overlap a concurrently running one, and blocks until granted a permit.
struct OverlapGuardEngine {
    running: Mutex<Vec<ReplayRequest>>,
    history: Mutex<Vec<ReplayRequest>>,
    conflicts: AtomicUsize,
    permits: Semaphore,
}

impl OverlapGuardEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            running: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            conflicts: AtomicUsize::new(0),
            permits: Semaphore::new(0),
        })
    }

    fn scan_count(&self) -> usize {
        self.history.lock().len()
    }
}

#[async_trait]
impl ScanEngine for OverlapGuardEngine {
    async fn scan(
        &self,
        request: ReplayRequest,
        _progress: ReplayProgress,
        _superseded: SupersededFlag,
    ) -> Result<()> {
        {
            let mut running = self.running.lock();
            for other in running.iter() {
                if !other.wallets.is_disjoint(&request.wallets) {
                    self.conflicts.fetch_add(1, Ordering::SeqCst);
                }
            }
            running.push(request.clone());
            self.history.lock().push(request.clone());
        }
        self.permits.acquire().await.unwrap().forget();
        self.running.lock().retain(|r| r != &request);
        Ok(())
    }
}

/// Engine that fails every scan.
struct FailingEngine {
    attempts: Mutex<Vec<ReplayRequest>>,
}

#[async_trait]
impl ScanEngine for FailingEngine {
    async fn scan(
        &self,
        request: ReplayRequest,
        _progress: ReplayProgress,
        _superseded: SupersededFlag,
    ) -> Result<()> {
        self.attempts.lock().push(request);
        Err(galleon_coord::Error::Scan("engine unavailable".into()))
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test(flavor = "multi_thread")]
async fn overlapping_offers_merge_into_one_follow_up_scan() {
    let engine = BlockingEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021))),
        OfferOutcome::Started
    );
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 1).await;
    }

    // Two more requests arrive while the scan is in flight.
    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("a"), ts(2019))),
        OfferOutcome::Merged
    );
    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("a"), ts(2020))),
        OfferOutcome::Merged
    );

    // The in-flight scan is marked superseded so the engine may yield early.
    assert!(engine.flag(0).is_superseded());

    engine.permits.add_permits(1);
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 2).await;
    }

    // One follow-up scan covering the earliest of the merged requests.
    assert_eq!(engine.request(1).earliest, ts(2019));
    assert!(!engine.flag(1).is_superseded());

    engine.permits.add_permits(1);
    {
        let scheduler = scheduler.clone();
        let id = wallet("a");
        wait_until(move || !scheduler.is_scanning(&id)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.scan_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn later_offer_is_covered_without_superseding() {
    let engine = BlockingEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2019)));
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 1).await;
    }

    // The in-flight scan already spans 2021; nothing to follow up, and the
    // engine is never told to yield a window it would then lose.
    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021))),
        OfferOutcome::Merged
    );
    assert!(!engine.flag(0).is_superseded());

    engine.permits.add_permits(1);
    {
        let scheduler = scheduler.clone();
        let id = wallet("a");
        wait_until(move || !scheduler.is_scanning(&id)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.scan_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn follow_up_retains_the_in_flight_start_point() {
    let engine = BlockingEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2019)));
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 1).await;
    }

    // A widening offer with a later timestamp supersedes the scan, so the
    // follow-up must keep the earlier start point of the scan it replaces.
    let mut widened = ReplayRequest::new(wallet("a"), ts(2021));
    widened.wallets.insert(wallet("b"));
    assert_eq!(scheduler.offer(widened), OfferOutcome::Merged);
    assert!(engine.flag(0).is_superseded());

    engine.permits.add_permits(1);
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 2).await;
    }
    let follow_up = engine.request(1);
    assert_eq!(follow_up.earliest, ts(2019));
    assert!(follow_up.wallets.contains(&wallet("a")));
    assert!(follow_up.wallets.contains(&wallet("b")));
    engine.permits.add_permits(1);
}

#[tokio::test(flavor = "multi_thread")]
async fn spanning_request_never_runs_overlapping_scans_concurrently() {
    let engine = OverlapGuardEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021)));
    scheduler.offer(ReplayRequest::new(wallet("b"), ts(2021)));
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 2).await;
    }

    // One request spanning both active scans.
    let mut spanning = ReplayRequest::new(wallet("a"), ts(2019));
    spanning.wallets.insert(wallet("b"));
    assert_eq!(scheduler.offer(spanning), OfferOutcome::Merged);

    engine.permits.add_permits(3);
    {
        let scheduler = scheduler.clone();
        let a = wallet("a");
        let b = wallet("b");
        wait_until(move || !scheduler.is_scanning(&a) && !scheduler.is_scanning(&b)).await;
    }

    // The spanning follow-up waited for both originals; at no point did the
    // engine run two scans sharing a wallet.
    assert_eq!(engine.conflicts.load(Ordering::SeqCst), 0);
    let history = engine.history.lock();
    assert_eq!(history.len(), 3);
    let follow_up = history.iter().find(|r| r.wallets.len() == 2).unwrap();
    assert_eq!(follow_up.earliest, ts(2019));
}

#[tokio::test(flavor = "multi_thread")]
async fn genesis_dominates_pending_merge() {
    let engine = BlockingEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021)));
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 1).await;
    }

    scheduler.offer(ReplayRequest::new(wallet("a"), ReplayTimestamp::Genesis));
    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2015)));

    engine.permits.add_permits(1);
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 2).await;
    }
    assert!(engine.request(1).earliest.is_genesis());
    engine.permits.add_permits(1);
}

#[tokio::test(flavor = "multi_thread")]
async fn disjoint_wallets_scan_concurrently() {
    let engine = BlockingEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021))),
        OfferOutcome::Started
    );
    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("b"), ts(2022))),
        OfferOutcome::Started
    );

    // Both scans run without waiting on each other.
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 2).await;
    }
    assert!(scheduler.is_scanning(&wallet("a")));
    assert!(scheduler.is_scanning(&wallet("b")));
    engine.permits.add_permits(2);
}

#[tokio::test(flavor = "multi_thread")]
async fn request_overlapping_pending_wallets_still_merges() {
    let engine = BlockingEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021)));
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 1).await;
    }

    // Widen the pending set to {a, b}, then offer for b alone: it must fold
    // into the same pending scan, not start a parallel one.
    let mut widened = ReplayRequest::new(wallet("a"), ts(2020));
    widened.wallets.insert(wallet("b"));
    assert_eq!(scheduler.offer(widened), OfferOutcome::Merged);
    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("b"), ts(2018))),
        OfferOutcome::Merged
    );

    engine.permits.add_permits(1);
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 2).await;
    }
    let follow_up = engine.request(1);
    assert_eq!(follow_up.earliest, ts(2018));
    assert!(follow_up.wallets.contains(&wallet("a")));
    assert!(follow_up.wallets.contains(&wallet("b")));
    engine.permits.add_permits(1);
}

#[tokio::test(flavor = "multi_thread")]
async fn scheduler_goes_idle_after_completion_and_restarts() {
    let engine = BlockingEngine::new();
    let scheduler = ReplayScheduler::new(engine.clone());

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021)));
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 1).await;
    }
    assert!(scheduler.progress_for(&wallet("a")).is_some());

    engine.permits.add_permits(1);
    {
        let scheduler = scheduler.clone();
        let id = wallet("a");
        wait_until(move || !scheduler.is_scanning(&id)).await;
    }
    assert!(scheduler.progress_for(&wallet("a")).is_none());

    // A new offer after idle starts a fresh scan.
    assert_eq!(
        scheduler.offer(ReplayRequest::new(wallet("a"), ts(2023))),
        OfferOutcome::Started
    );
    {
        let engine = engine.clone();
        wait_until(move || engine.scan_count() == 2).await;
    }
    engine.permits.add_permits(1);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_scan_still_starts_pending_merge() {
    let engine = Arc::new(FailingEngine {
        attempts: Mutex::new(Vec::new()),
    });
    let scheduler = ReplayScheduler::new(engine.clone());

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2021)));
    {
        let scheduler = scheduler.clone();
        let id = wallet("a");
        wait_until(move || !scheduler.is_scanning(&id)).await;
    }
    // The fault is absorbed; the wallet set is idle again.
    assert_eq!(engine.attempts.lock().len(), 1);

    scheduler.offer(ReplayRequest::new(wallet("a"), ts(2019)));
    {
        let scheduler = scheduler.clone();
        let id = wallet("a");
        wait_until(move || !scheduler.is_scanning(&id)).await;
    }
    assert_eq!(engine.attempts.lock().len(), 2);
}
