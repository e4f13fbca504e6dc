//! Property tests for the replay merge laws

use chrono::{TimeZone, Utc};
use galleon_coord::{ReplayRequest, ReplayTimestamp, WalletId};
use proptest::prelude::*;
use std::collections::HashSet;

fn timestamp_strategy() -> impl Strategy<Value = ReplayTimestamp> {
    prop_oneof![
        1 => Just(ReplayTimestamp::Genesis),
        4 => (946_684_800i64..1_893_456_000i64).prop_map(|secs| {
            ReplayTimestamp::At(Utc.timestamp_opt(secs, 0).unwrap())
        }),
    ]
}

fn wallet_set_strategy() -> impl Strategy<Value = HashSet<WalletId>> {
    prop::collection::hash_set(0u8..8u8, 1..4).prop_map(|names| {
        names
            .into_iter()
            .map(|n| WalletId::new(format!("/wallets/{n}.wallet")))
            .collect()
    })
}

fn request_strategy() -> impl Strategy<Value = ReplayRequest> {
    (
        wallet_set_strategy(),
        timestamp_strategy(),
        prop::option::of(0u64..5_000_000u64),
    )
        .prop_map(|(wallets, earliest, hint)| {
            let mut request = ReplayRequest::for_wallets(wallets, earliest);
            request.start_height_hint = hint;
            request
        })
}

proptest! {
    #[test]
    fn merged_timestamp_is_minimum(a in request_strategy(), b in request_strategy()) {
        let expected = a.earliest.min(b.earliest);
        let merged = a.merge(b);
        prop_assert_eq!(merged.earliest, expected);
    }

    #[test]
    fn genesis_dominates(a in request_strategy()) {
        let genesis = ReplayRequest::for_wallets(a.wallets.clone(), ReplayTimestamp::Genesis);
        let merged = a.merge(genesis);
        prop_assert!(merged.earliest.is_genesis());
    }

    #[test]
    fn merged_wallets_are_the_union(a in request_strategy(), b in request_strategy()) {
        let union: HashSet<_> = a.wallets.union(&b.wallets).cloned().collect();
        let merged = a.merge(b);
        prop_assert_eq!(merged.wallets, union);
    }

    #[test]
    fn merge_is_commutative_on_window(a in request_strategy(), b in request_strategy()) {
        let ab = a.clone().merge(b.clone());
        let ba = b.merge(a);
        prop_assert_eq!(ab.earliest, ba.earliest);
        prop_assert_eq!(ab.wallets, ba.wallets);
        prop_assert_eq!(ab.start_height_hint, ba.start_height_hint);
    }

    #[test]
    fn merge_is_associative_on_window(
        a in request_strategy(),
        b in request_strategy(),
        c in request_strategy(),
    ) {
        let left = a.clone().merge(b.clone()).merge(c.clone());
        let right = a.merge(b.merge(c));
        prop_assert_eq!(left.earliest, right.earliest);
        prop_assert_eq!(left.wallets, right.wallets);
    }

    #[test]
    fn merging_never_narrows_the_window(a in request_strategy(), b in request_strategy()) {
        let a_earliest = a.earliest;
        let b_earliest = b.earliest;
        let merged = a.merge(b);
        prop_assert!(merged.earliest <= a_earliest);
        prop_assert!(merged.earliest <= b_earliest);
    }
}
