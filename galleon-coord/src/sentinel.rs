//! External-change detection
//!
//! Compares a wallet's recorded on-disk fingerprint against the current
//! file state. The check is advisory (size + mtime, not a content hash) and
//! runs before every mutating action; once a change is detected the flag is
//! sticky until the wallet is explicitly reloaded through the registry.

use crate::handle::{WalletEvent, WalletHandle};
use galleon_core::WalletStore;
use std::sync::Arc;
use tracing::warn;

/// Detects that the wallet file was changed by an external process.
pub struct ExternalChangeSentinel {
    store: Arc<dyn WalletStore>,
}

impl ExternalChangeSentinel {
    /// Create a sentinel over the given persistence capability.
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Check whether the wallet's file no longer matches its recorded
    /// fingerprint.
    ///
    /// Returns `true` if the wallet is flagged (newly or already). A wallet
    /// whose file vanished or whose metadata is unreadable counts as
    /// changed; mutating against a missing primary is never safe. A wallet
    /// with no recorded fingerprint (never saved) cannot be stale.
    ///
    /// Callers must run this before contending for the gate: a stale wallet
    /// never even attempts to acquire.
    pub fn check_for_external_change(&self, wallet: &WalletHandle) -> bool {
        let recorded = {
            let state = wallet.lock_state();
            if state.externally_changed {
                return true;
            }
            match state.fingerprint {
                Some(fp) => fp,
                None => return false,
            }
        };

        let changed = match self.store.fingerprint(wallet.path()) {
            Ok(current) => current != recorded,
            Err(e) => {
                warn!(wallet = %wallet.id(), error = %e, "Wallet file unreadable during staleness check");
                true
            }
        };

        if changed {
            {
                let mut state = wallet.lock_state();
                // Another checker may have flagged it meanwhile.
                if state.externally_changed {
                    return true;
                }
                state.externally_changed = true;
            }
            warn!(wallet = %wallet.id(), "Wallet file changed by external process; mutations blocked until reload");
            wallet.notify(&WalletEvent::ExternallyChanged);
        }
        changed
    }
}
