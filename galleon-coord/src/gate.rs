//! Per-wallet mutual exclusion
//!
//! The single serialization point for mutating actions. Every mutation must
//! acquire here before touching wallet state; a refusal names the task
//! holding the gate so the user can be told what the wallet is busy with.

use crate::handle::{WalletEvent, WalletHandle};
use crate::{Error, Result};
use tracing::{debug, warn};

/// Per-wallet busy flag with a human-readable task label.
#[derive(Default)]
pub struct MutationGate;

impl MutationGate {
    /// Create a gate.
    pub fn new() -> Self {
        Self
    }

    /// Atomically check-and-set the busy flag.
    ///
    /// Notifies listeners of the busy transition if the wallet was idle.
    /// Otherwise refuses with [`Error::WalletBusy`] carrying the holder's
    /// label, captured under the same lock as the check so the refusal
    /// always names the blocking task. The busy notification fires before
    /// any of the operation's side effects can begin.
    pub fn try_acquire(&self, wallet: &WalletHandle, label: &str) -> Result<()> {
        {
            let mut state = wallet.lock_state();
            if state.busy {
                let held_by = state.busy_label.clone().unwrap_or_default();
                debug!(
                    wallet = %wallet.id(),
                    held_by,
                    rejected = label,
                    "Mutation gate already held"
                );
                return Err(Error::WalletBusy { label: held_by });
            }
            state.busy = true;
            state.busy_label = Some(label.to_string());
        }
        debug!(wallet = %wallet.id(), label, "Mutation gate acquired");
        wallet.notify(&WalletEvent::BusyChanged {
            busy: true,
            label: Some(label.to_string()),
        });
        Ok(())
    }

    /// Release the gate.
    ///
    /// Must be invoked exactly once per successful [`try_acquire`], on every
    /// exit path. A release without a matching acquire is logged and
    /// ignored.
    ///
    /// [`try_acquire`]: MutationGate::try_acquire
    pub fn release(&self, wallet: &WalletHandle) {
        {
            let mut state = wallet.lock_state();
            if !state.busy {
                warn!(wallet = %wallet.id(), "Gate release without matching acquire");
                return;
            }
            state.busy = false;
            state.busy_label = None;
        }
        debug!(wallet = %wallet.id(), "Mutation gate released");
        wallet.notify(&WalletEvent::BusyChanged {
            busy: false,
            label: None,
        });
    }

    /// Read-only busy snapshot for UI enablement.
    pub fn is_busy(&self, wallet: &WalletHandle) -> (bool, Option<String>) {
        wallet.is_busy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::WalletId;

    fn handle() -> WalletHandle {
        WalletHandle::new(WalletId::new("/tmp/gate.wallet"), None)
    }

    #[test]
    fn acquire_sets_busy_and_label() {
        let gate = MutationGate::new();
        let wallet = handle();

        assert!(gate.try_acquire(&wallet, "encrypt wallet").is_ok());
        assert_eq!(
            gate.is_busy(&wallet),
            (true, Some("encrypt wallet".to_string()))
        );
    }

    #[test]
    fn refusal_names_the_holder() {
        let gate = MutationGate::new();
        let wallet = handle();

        assert!(gate.try_acquire(&wallet, "import keys").is_ok());
        match gate.try_acquire(&wallet, "generate address") {
            Err(Error::WalletBusy { label }) => assert_eq!(label, "import keys"),
            other => panic!("expected WalletBusy, got {other:?}"),
        }
        // Still held by the first operation.
        assert_eq!(gate.is_busy(&wallet).1.as_deref(), Some("import keys"));
    }

    #[test]
    fn release_clears_busy_and_label() {
        let gate = MutationGate::new();
        let wallet = handle();

        assert!(gate.try_acquire(&wallet, "decrypt wallet").is_ok());
        gate.release(&wallet);
        assert_eq!(gate.is_busy(&wallet), (false, None));
        // Gate can be taken again after release.
        assert!(gate.try_acquire(&wallet, "export keys").is_ok());
    }

    #[test]
    fn release_without_acquire_is_ignored() {
        let gate = MutationGate::new();
        let wallet = handle();
        gate.release(&wallet);
        assert_eq!(gate.is_busy(&wallet), (false, None));
    }
}
