//! Background execution of wallet mutations
//!
//! One generic submit path implements the gate/release/notify discipline
//! once, instead of once per UI action. A submitted operation runs on a
//! blocking worker (it may sit in I/O or key derivation for a while); the
//! submitting thread never waits on it.
//!
//! Mutations are not cancellable once started: encrypt/decrypt/import
//! partially applied would corrupt the keyring, and those operations are
//! short enough that cancellation buys nothing. Long-running replay work is
//! the scheduler's business and is supersedable there.

use crate::gate::MutationGate;
use crate::handle::{WalletHandle, WalletId};
use crate::replay::ReplayRequest;
use crate::scheduler::ReplayScheduler;
use crate::sentinel::ExternalChangeSentinel;
use crate::{Error, Result};
use galleon_backup::{BackupCoordinator, BackupPosture};
use galleon_core::Fingerprint;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a successful mutation asks the coordinator to do next.
#[derive(Default)]
pub struct MutationEffects {
    /// Fingerprint of the wallet file after a durable save; recording it
    /// also clears the dirty flag.
    pub new_fingerprint: Option<Fingerprint>,
    /// Replay request to hand to the scheduler (the mutation invalidated
    /// cached transaction state).
    pub replay: Option<ReplayRequest>,
    /// Posture for a post-mutation backup pass, if one is wanted.
    pub backup: Option<BackupPosture>,
}

impl MutationEffects {
    /// A mutation with no follow-up effects.
    pub fn none() -> Self {
        Self::default()
    }

    /// Record a durable save.
    pub fn saved(mut self, fingerprint: Fingerprint) -> Self {
        self.new_fingerprint = Some(fingerprint);
        self
    }

    /// Emit a replay request.
    pub fn with_replay(mut self, request: ReplayRequest) -> Self {
        self.replay = Some(request);
        self
    }

    /// Request a backup pass with the given posture.
    pub fn with_backup(mut self, posture: BackupPosture) -> Self {
        self.backup = Some(posture);
        self
    }
}

type Operation = Box<dyn FnOnce(WalletHandle) -> Result<MutationEffects> + Send + 'static>;
type Completion = Box<dyn FnOnce(TaskOutcome) + Send + 'static>;

/// Outcome delivered to `on_complete`, exactly once per dispatched request.
#[derive(Debug)]
pub struct TaskOutcome {
    /// Wallet the mutation ran against.
    pub wallet: WalletId,
    /// The request's label.
    pub label: String,
    /// `Ok` on success; `OperationFailed`, `PersistenceFailed`, or `Fault`
    /// otherwise. `StaleWallet` and `WalletBusy` never appear here; they
    /// are returned synchronously from submit.
    pub result: Result<()>,
}

/// A unit of mutating work against one wallet.
pub struct MutationRequest {
    wallet: WalletHandle,
    label: String,
    operation: Operation,
    on_complete: Option<Completion>,
}

impl MutationRequest {
    /// Build a request. The operation runs on a blocking worker and may
    /// block on I/O or key derivation.
    pub fn new(
        wallet: WalletHandle,
        label: impl Into<String>,
        operation: impl FnOnce(WalletHandle) -> Result<MutationEffects> + Send + 'static,
    ) -> Self {
        Self {
            wallet,
            label: label.into(),
            operation: Box::new(operation),
            on_complete: None,
        }
    }

    /// Attach a completion callback; invoked asynchronously, never on the
    /// submitting thread.
    pub fn on_complete(mut self, callback: impl FnOnce(TaskOutcome) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

/// Runs one mutating operation at a time per wallet, off the interactive
/// thread, with guaranteed gate release on every exit path.
pub struct TaskExecutor {
    gate: Arc<MutationGate>,
    sentinel: Arc<ExternalChangeSentinel>,
    scheduler: Option<Arc<ReplayScheduler>>,
    backups: Option<Arc<BackupCoordinator>>,
}

impl TaskExecutor {
    /// Create an executor over the gate and sentinel.
    pub fn new(gate: Arc<MutationGate>, sentinel: Arc<ExternalChangeSentinel>) -> Self {
        Self {
            gate,
            sentinel,
            scheduler: None,
            backups: None,
        }
    }

    /// Route emitted replay requests to this scheduler.
    pub fn with_scheduler(mut self, scheduler: Arc<ReplayScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Route backup passes to this coordinator.
    pub fn with_backups(mut self, backups: Arc<BackupCoordinator>) -> Self {
        self.backups = Some(backups);
        self
    }

    /// Submit a mutation.
    ///
    /// Performs, in order: the staleness check (refused synchronously with
    /// [`Error::StaleWallet`]), the gate acquisition (refused synchronously
    /// with [`Error::WalletBusy`] carrying the blocking task's label), then
    /// dispatch onto a worker. On worker completion (success, domain
    /// error, or panic) the gate is released unconditionally and
    /// `on_complete` fires with the outcome.
    ///
    /// Must be called from within a tokio runtime. Workers for different
    /// wallets run fully concurrently; workers for the same wallet never
    /// overlap.
    pub fn submit(&self, request: MutationRequest) -> Result<()> {
        let MutationRequest {
            wallet,
            label,
            operation,
            on_complete,
        } = request;

        // A stale wallet never even contends for the gate.
        if self.sentinel.check_for_external_change(&wallet) {
            return Err(Error::StaleWallet(wallet.id().clone()));
        }

        self.gate.try_acquire(&wallet, &label)?;

        info!(wallet = %wallet.id(), label, "Dispatching mutation");
        let gate = self.gate.clone();
        let scheduler = self.scheduler.clone();
        let backups = self.backups.clone();

        tokio::spawn(async move {
            let worker_wallet = wallet.clone();
            let joined =
                tokio::task::spawn_blocking(move || operation(worker_wallet)).await;

            let result = match joined {
                Ok(Ok(effects)) => {
                    route_effects(&wallet, effects, scheduler, backups).await;
                    Ok(())
                }
                Ok(Err(e)) => Err(e),
                Err(join_err) if join_err.is_panic() => {
                    Err(Error::Fault(panic_message(join_err)))
                }
                Err(join_err) => Err(Error::Fault(join_err.to_string())),
            };

            if let Err(ref e) = result {
                warn!(wallet = %wallet.id(), label, error = %e, "Mutation failed");
            }

            // Release on every exit path, before the caller learns the
            // outcome.
            gate.release(&wallet);

            if let Some(callback) = on_complete {
                callback(TaskOutcome {
                    wallet: wallet.id().clone(),
                    label,
                    result,
                });
            }
        });

        Ok(())
    }
}

/// Apply a successful mutation's follow-up effects.
async fn route_effects(
    wallet: &WalletHandle,
    effects: MutationEffects,
    scheduler: Option<Arc<ReplayScheduler>>,
    backups: Option<Arc<BackupCoordinator>>,
) {
    if let Some(fingerprint) = effects.new_fingerprint {
        wallet.record_fingerprint(fingerprint);
        debug!(wallet = %wallet.id(), "Recorded post-save fingerprint");
    }

    if let Some(request) = effects.replay {
        match scheduler {
            Some(scheduler) => {
                let outcome = scheduler.offer(request);
                debug!(wallet = %wallet.id(), ?outcome, "Offered replay request");
            }
            None => warn!(wallet = %wallet.id(), "Replay requested but no scheduler configured"),
        }
    }

    if let Some(posture) = effects.backup {
        match backups {
            Some(backups) => {
                // Backup failure never rolls back the primary mutation.
                let primary = wallet.path().to_path_buf();
                let joined = tokio::task::spawn_blocking(move || {
                    backups.backup_after_mutation(&primary, &posture)
                })
                .await;
                match joined {
                    Ok(Ok(report)) => {
                        for failure in &report.failures {
                            warn!(
                                wallet = %wallet.id(),
                                path = %failure.path.display(),
                                reason = %failure.reason,
                                "Backup copy failed"
                            );
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(wallet = %wallet.id(), error = %e, "Backup pass failed")
                    }
                    Err(e) => warn!(wallet = %wallet.id(), error = %e, "Backup worker fault"),
                }
            }
            None => warn!(wallet = %wallet.id(), "Backup requested but no coordinator configured"),
        }
    }
}

fn panic_message(join_err: tokio::task::JoinError) -> String {
    match join_err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "worker panicked".to_string()
            }
        }
        Err(e) => e.to_string(),
    }
}
