//! Wallet handles, the open-wallet registry, and the listener bus
//!
//! The handle's mutable fields (`busy`, `busy_label`, `dirty`,
//! `externally_changed`, `fingerprint`) are owned exclusively by the
//! coordinator; all access goes through gate/sentinel/registry methods so a
//! worker finishing can never race a UI read of busy state.

use crate::{Error, Result};
use galleon_core::{Fingerprint, WalletStore};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Stable wallet identifier: the persistence path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletId(PathBuf);

impl WalletId {
    /// Create an id from a persistence path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// The persistence path this id wraps.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// State transition observed on a wallet.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    /// Busy flag flipped.
    BusyChanged {
        /// New busy value
        busy: bool,
        /// Label of the operation holding the gate, if any
        label: Option<String>,
    },
    /// The persisted file was changed by an external process.
    ExternallyChanged,
}

/// Observer of wallet state transitions.
///
/// Notifications are delivered synchronously on the thread that changed the
/// state. Workers notify from the worker thread; a UI listener must
/// re-dispatch to its own thread before touching UI state.
pub trait WalletListener: Send + Sync {
    /// Called on every transition for a wallet this listener subscribed to.
    fn on_wallet_event(&self, id: &WalletId, event: &WalletEvent);
}

#[derive(Debug, Default)]
pub(crate) struct HandleState {
    pub(crate) busy: bool,
    pub(crate) busy_label: Option<String>,
    pub(crate) dirty: bool,
    pub(crate) externally_changed: bool,
    pub(crate) fingerprint: Option<Fingerprint>,
}

struct HandleInner {
    id: WalletId,
    state: Mutex<HandleState>,
    listeners: Mutex<Vec<Arc<dyn WalletListener>>>,
}

/// Shared handle to one open wallet.
#[derive(Clone)]
pub struct WalletHandle {
    inner: Arc<HandleInner>,
}

impl WalletHandle {
    pub(crate) fn new(id: WalletId, fingerprint: Option<Fingerprint>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                state: Mutex::new(HandleState {
                    fingerprint,
                    ..HandleState::default()
                }),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// This wallet's identifier.
    pub fn id(&self) -> &WalletId {
        &self.inner.id
    }

    /// The wallet's persistence path.
    pub fn path(&self) -> &Path {
        self.inner.id.path()
    }

    /// Busy snapshot: flag plus the label of the in-flight operation.
    pub fn is_busy(&self) -> (bool, Option<String>) {
        let state = self.inner.state.lock();
        (state.busy, state.busy_label.clone())
    }

    /// Whether in-memory state has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    /// Mark in-memory state as having unsaved changes.
    pub fn mark_dirty(&self) {
        self.inner.state.lock().dirty = true;
    }

    /// Whether the persisted file was changed externally. Sticky until the
    /// wallet is explicitly reloaded.
    pub fn externally_changed(&self) -> bool {
        self.inner.state.lock().externally_changed
    }

    /// Last-known on-disk fingerprint.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.inner.state.lock().fingerprint
    }

    /// Record the fingerprint from a successful durable save and clear the
    /// dirty flag.
    pub fn record_fingerprint(&self, fingerprint: Fingerprint) {
        let mut state = self.inner.state.lock();
        state.fingerprint = Some(fingerprint);
        state.dirty = false;
    }

    /// Register an observer for this wallet's transitions.
    pub fn subscribe(&self, listener: Arc<dyn WalletListener>) {
        self.inner.listeners.lock().push(listener);
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, HandleState> {
        self.inner.state.lock()
    }

    /// Notify listeners synchronously on the current thread.
    ///
    /// Called after the state lock is dropped; per-wallet ordering still
    /// holds because transitions for one wallet are serialized by the gate.
    pub(crate) fn notify(&self, event: &WalletEvent) {
        let listeners = self.inner.listeners.lock().clone();
        for listener in listeners {
            listener.on_wallet_event(&self.inner.id, event);
        }
    }
}

/// Registry of open wallets.
///
/// Constructed once at startup and passed where needed; there is no global
/// instance.
pub struct WalletRegistry {
    store: Arc<dyn WalletStore>,
    wallets: RwLock<HashMap<WalletId, WalletHandle>>,
}

impl WalletRegistry {
    /// Create a registry over the given persistence capability.
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self {
            store,
            wallets: RwLock::new(HashMap::new()),
        }
    }

    /// Open a wallet, capturing its on-disk fingerprint.
    ///
    /// Opening an already-open wallet returns the existing handle.
    pub fn open(&self, path: impl Into<PathBuf>) -> Result<WalletHandle> {
        let id = WalletId::new(path);
        if let Some(handle) = self.wallets.read().get(&id) {
            return Ok(handle.clone());
        }
        let fingerprint = self.store.fingerprint(id.path())?;
        let handle = WalletHandle::new(id.clone(), Some(fingerprint));
        info!(wallet = %id, "Opened wallet");
        self.wallets.write().insert(id, handle.clone());
        Ok(handle)
    }

    /// Look up an open wallet.
    pub fn get(&self, id: &WalletId) -> Option<WalletHandle> {
        self.wallets.read().get(id).cloned()
    }

    /// Reload a wallet after an external change: refresh the recorded
    /// fingerprint and clear the sticky `externally_changed` flag.
    ///
    /// This is the only way the flag is cleared.
    pub fn reload(&self, id: &WalletId) -> Result<WalletHandle> {
        let handle = self.get(id).ok_or_else(|| Error::NotOpen(id.clone()))?;
        let fingerprint = self.store.fingerprint(id.path())?;
        {
            let mut state = handle.lock_state();
            state.fingerprint = Some(fingerprint);
            state.externally_changed = false;
            state.dirty = false;
        }
        info!(wallet = %id, "Reloaded wallet, external-change flag cleared");
        Ok(handle)
    }

    /// Close a wallet, dropping its handle from the registry.
    pub fn close(&self, id: &WalletId) {
        if self.wallets.write().remove(id).is_some() {
            debug!(wallet = %id, "Closed wallet");
        }
    }
}
