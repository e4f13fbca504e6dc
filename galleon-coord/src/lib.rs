//! Wallet mutation coordinator
//!
//! Serializes mutating operations per wallet, runs them off the interactive
//! thread, detects external changes to the persisted wallet file, and merges
//! chain-replay requests into one consistent scan window.
//!
//! The moving parts, leaves first:
//!
//! - [`MutationGate`]: per-wallet mutual-exclusion flag with a task label
//! - [`ExternalChangeSentinel`]: sticky staleness detection from on-disk
//!   fingerprints
//! - [`TaskExecutor`]: one worker per submitted mutation, with guaranteed
//!   gate release on every exit path
//! - [`ReplayScheduler`]: merges overlapping replay requests and hands them
//!   to the external scan engine one at a time per wallet
//!
//! Listener notifications are synchronous on the thread that changed the
//! state; UI observers must re-dispatch to their own thread.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod executor;
pub mod gate;
pub mod handle;
pub mod progress;
pub mod replay;
pub mod scheduler;
pub mod sentinel;
pub mod supersede;

pub use error::{Error, Result};
pub use executor::{MutationEffects, MutationRequest, TaskExecutor, TaskOutcome};
pub use gate::MutationGate;
pub use handle::{WalletEvent, WalletHandle, WalletId, WalletListener, WalletRegistry};
pub use progress::{ReplayProgress, ReplayStage};
pub use replay::{ReplayRequest, ReplayTimestamp};
pub use scheduler::{OfferOutcome, ReplayScheduler, ScanEngine};
pub use sentinel::ExternalChangeSentinel;
pub use supersede::SupersededFlag;
