//! Replay requests and their merge laws
//!
//! A replay request describes a required chain rescan: which wallets, from
//! what point in time, with an optional start-height hint. Overlapping
//! requests merge to the union of wallets and the earliest timestamp; an
//! unknown timestamp forces a full rescan from genesis and dominates any
//! merge.

use crate::handle::WalletId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Earliest point to rescan from.
///
/// `Genesis` means "start of the chain" and is used when a key's creation
/// time is unknown. Variant order matters: the derived ordering makes
/// `Genesis` the minimum, so merging to the earliest timestamp is `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReplayTimestamp {
    /// Rescan from the start of the chain.
    Genesis,
    /// Rescan from the given time.
    At(DateTime<Utc>),
}

impl ReplayTimestamp {
    /// The earlier of two timestamps; `Genesis` dominates.
    pub fn earliest(self, other: Self) -> Self {
        self.min(other)
    }

    /// Whether this is a full-rescan timestamp.
    pub fn is_genesis(&self) -> bool {
        matches!(self, Self::Genesis)
    }
}

/// A required chain rescan for a set of wallets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRequest {
    /// Wallets needing rescan (usually one).
    pub wallets: HashSet<WalletId>,
    /// Earliest point to rescan from.
    pub earliest: ReplayTimestamp,
    /// Optional start-height optimization hint.
    pub start_height_hint: Option<u64>,
}

impl ReplayRequest {
    /// Request a rescan of a single wallet.
    pub fn new(wallet: WalletId, earliest: ReplayTimestamp) -> Self {
        Self {
            wallets: HashSet::from([wallet]),
            earliest,
            start_height_hint: None,
        }
    }

    /// Request a rescan of several wallets at once.
    pub fn for_wallets(wallets: HashSet<WalletId>, earliest: ReplayTimestamp) -> Self {
        Self {
            wallets,
            earliest,
            start_height_hint: None,
        }
    }

    /// Attach a start-height hint.
    pub fn with_hint(mut self, height: u64) -> Self {
        self.start_height_hint = Some(height);
        self
    }

    /// Whether this request shares any wallet with the given set.
    pub fn overlaps(&self, wallets: &HashSet<WalletId>) -> bool {
        !self.wallets.is_disjoint(wallets)
    }

    /// Whether this request's window already spans the other's: every wallet
    /// is present and the start point is no later. A scan running a covering
    /// request needs no follow-up for the covered one.
    pub fn covers(&self, other: &Self) -> bool {
        self.earliest <= other.earliest && other.wallets.is_subset(&self.wallets)
    }

    /// Merge two requests: wallet-set union, earliest timestamp wins
    /// (`Genesis` dominates).
    ///
    /// The hint follows the request with the earlier timestamp; on equal
    /// timestamps the smaller hint wins, and a missing hint on either side
    /// yields no hint. A hint is only an optimization, so absence is always
    /// safe.
    pub fn merge(mut self, other: Self) -> Self {
        use std::cmp::Ordering;

        self.start_height_hint = match self.earliest.cmp(&other.earliest) {
            Ordering::Less => self.start_height_hint,
            Ordering::Greater => other.start_height_hint,
            Ordering::Equal => match (self.start_height_hint, other.start_height_hint) {
                (Some(a), Some(b)) => Some(a.min(b)),
                _ => None,
            },
        };
        self.earliest = self.earliest.earliest(other.earliest);
        self.wallets.extend(other.wallets);
        self
    }
}
