//! Property-based tests for the balance aggregator and settlement minimizer.

use proptest::prelude::*;

use std::collections::HashMap;

use crate::balance::{aggregate, try_aggregate, Balances};
use crate::ledger::{Allocation, GroupId, LedgerEntry, ParticipantId};
use crate::money::Amount;
use crate::settlement::{minimize, minimize_strict};
use crate::split::SplitRule;

const GROUP: GroupId = GroupId(1);

/// Balances for 2-12 participants that sum to zero.
fn zero_sum_balances() -> impl Strategy<Value = Vec<(ParticipantId, Amount)>> {
    prop::collection::vec(-1_000_000i64..1_000_000, 1..12).prop_map(|values| {
        let residual: Amount = values.iter().sum();
        values
            .into_iter()
            .chain(std::iter::once(-residual))
            .enumerate()
            .map(|(idx, amount)| (ParticipantId(idx as u32 + 1), amount))
            .collect()
    })
}

/// Amounts within a thousand units of either `i64` limit.
fn near_limit() -> impl Strategy<Value = Amount> {
    prop_oneof![Amount::MAX - 1_000..=Amount::MAX, Amount::MIN..=Amount::MIN + 1_000]
}

/// Zero-sum balances with magnitudes near `i64::MAX`, plus one `i64::MIN`
/// debtor balanced against two creditors.
fn near_limit_balances() -> impl Strategy<Value = Vec<(ParticipantId, Amount)>> {
    (
        prop::collection::vec(Amount::MAX - 1_000..=Amount::MAX, 1..6),
        0..=1_000i64,
    )
        .prop_map(|(values, split)| {
            let mut pairs = Vec::new();
            for (idx, value) in values.into_iter().enumerate() {
                let id = idx as u32 * 2 + 1;
                pairs.push((ParticipantId(id), value));
                pairs.push((ParticipantId(id + 1), -value));
            }
            // i64::MIN == -(i64::MAX - split) - (split + 1)
            pairs.push((ParticipantId(100), Amount::MIN));
            pairs.push((ParticipantId(101), Amount::MAX - split));
            pairs.push((ParticipantId(102), split + 1));
            pairs
        })
}

/// Single-share entries whose amounts sit near `i64::MAX`.
fn near_limit_ledger() -> impl Strategy<Value = Vec<LedgerEntry>> {
    prop::collection::vec(
        (Amount::MAX - 1_000..=Amount::MAX, 1u32..4, 1u32..4),
        0..6,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(idx, (amount, payer, debtor))| {
                LedgerEntry::new(
                    idx as u64,
                    GROUP,
                    ParticipantId(payer),
                    amount,
                    vec![Allocation::new(ParticipantId(debtor), amount)],
                )
            })
            .collect()
    })
}

/// A split rule over up to 6 participants, always valid for `amount`.
fn split_rule(amount: Amount) -> impl Strategy<Value = SplitRule> {
    let equal = prop::collection::vec(1u32..7, 1..6).prop_map(|ids| {
        let mut ids: Vec<ParticipantId> = ids.into_iter().map(ParticipantId).collect();
        ids.sort();
        ids.dedup();
        SplitRule::Equal(ids)
    });
    let percentage = prop::collection::vec((1u32..7, 0i64..25), 1..5).prop_map(|shares| {
        let used: i64 = shares.iter().map(|(_, pct)| pct).sum();
        let mut shares: Vec<(ParticipantId, i64)> = shares
            .into_iter()
            .map(|(id, pct)| (ParticipantId(id), pct))
            .collect();
        shares.push((ParticipantId(6), 100 - used));
        SplitRule::Percentage(shares)
    });
    let exact = prop::collection::vec(1u32..7, 1..5).prop_map(move |ids| {
        let count = ids.len() as i64;
        let mut shares: Vec<(ParticipantId, Amount)> = ids
            .into_iter()
            .map(|id| (ParticipantId(id), amount / count))
            .collect();
        shares[0].1 += amount % count;
        SplitRule::Exact(shares)
    });
    prop_oneof![equal, percentage, exact]
}

fn ledger_entry() -> impl Strategy<Value = LedgerEntry> {
    (1i64..10_000_000, 1u32..7).prop_flat_map(|(amount, payer)| {
        split_rule(amount).prop_map(move |rule| {
            let allocations = rule.allocate(amount).unwrap();
            LedgerEntry::new(0, GROUP, ParticipantId(payer), amount, allocations)
        })
    })
}

fn ledger() -> impl Strategy<Value = Vec<LedgerEntry>> {
    prop::collection::vec(ledger_entry(), 0..20).prop_map(|mut entries| {
        for (idx, entry) in entries.iter_mut().enumerate() {
            entry.id = idx as u64;
        }
        entries
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Split rules always allocate exactly the expense total.
    #[test]
    fn prop_split_allocates_exact_total(
        (amount, rule) in (1i64..10_000_000).prop_flat_map(|a| (Just(a), split_rule(a)))
    ) {
        let allocations = rule.allocate(amount).unwrap();
        prop_assert_eq!(allocations.iter().map(|a| a.amount).sum::<Amount>(), amount);
        prop_assert!(allocations.iter().all(|a| a.amount >= 0));
    }

    /// A consistent ledger aggregates to balances summing to zero.
    #[test]
    fn prop_aggregate_sums_to_zero(entries in ledger()) {
        prop_assert!(entries.iter().all(LedgerEntry::is_consistent));
        let balances = aggregate(&entries, GROUP);
        prop_assert_eq!(balances.total(), 0);
    }

    /// Applying the settlement zeroes every balance.
    #[test]
    fn prop_settlement_zeroes_balances(pairs in zero_sum_balances()) {
        let balances: Balances = pairs.into_iter().collect();
        let transfers = minimize(&balances);
        prop_assert!(balances.apply(&transfers).unwrap().is_settled());
    }

    /// Transfers are positive, never self-directed and bounded in count.
    #[test]
    fn prop_transfers_well_formed(pairs in zero_sum_balances()) {
        let balances: Balances = pairs.into_iter().collect();
        let transfers = minimize(&balances);

        prop_assert!(transfers.iter().all(|t| t.amount > 0));
        prop_assert!(transfers.iter().all(|t| t.from != t.to));

        let non_zero = balances.iter().filter(|&(_, a)| a != 0).count();
        if non_zero > 0 {
            prop_assert!(transfers.len() <= non_zero - 1);
        } else {
            prop_assert!(transfers.is_empty());
        }
    }

    /// Output depends only on the balances, not on map insertion order.
    #[test]
    fn prop_minimize_is_deterministic(pairs in zero_sum_balances()) {
        let forward: Balances = pairs.iter().copied().collect();
        let backward: Balances = pairs.iter().rev().copied().collect();
        prop_assert_eq!(minimize(&forward), minimize(&backward));
    }

    /// The full pipeline settles any consistent ledger.
    #[test]
    fn prop_ledger_pipeline_settles(entries in ledger()) {
        let balances = aggregate(&entries, GROUP);
        let transfers = minimize_strict(&balances).unwrap();
        prop_assert!(balances.apply(&transfers).unwrap().is_settled());
    }

    /// An all-zero balance needs no transfers.
    #[test]
    fn prop_all_zero_is_empty(count in 0u32..20) {
        let balances: Balances = (1..=count).map(|id| (ParticipantId(id), 0)).collect();
        prop_assert!(minimize(&balances).is_empty());
    }

    /// Strict mode rejects exactly the unbalanced inputs.
    #[test]
    fn prop_strict_rejects_residual(
        pairs in zero_sum_balances(),
        residual in prop_oneof![-1_000i64..0, 1i64..1_000],
    ) {
        let mut balances: Balances = pairs.into_iter().collect();
        prop_assert!(minimize_strict(&balances).is_ok());
        balances = balances
            .iter()
            .chain(std::iter::once((ParticipantId(999), residual)))
            .collect();
        prop_assert!(minimize_strict(&balances).is_err());
    }

    /// Settlement stays exact for balances at the edge of the `i64` range.
    #[test]
    fn prop_near_limit_balances_settle(pairs in near_limit_balances()) {
        let balances: Balances = pairs.into_iter().collect();
        prop_assert_eq!(balances.total(), 0);

        let transfers = minimize_strict(&balances).unwrap();
        prop_assert!(transfers.iter().all(|t| t.amount > 0 && t.from != t.to));
        prop_assert!(balances.apply(&transfers).unwrap().is_settled());
    }

    /// Aggregation near the limits is exact whenever the result fits, and
    /// reports overflow otherwise; it never wraps.
    #[test]
    fn prop_try_aggregate_exact_or_overflow(entries in near_limit_ledger()) {
        let mut expected: HashMap<ParticipantId, i128> = HashMap::new();
        for entry in &entries {
            *expected.entry(entry.payer).or_insert(0) += i128::from(entry.amount);
            for allocation in &entry.allocations {
                *expected.entry(allocation.participant).or_insert(0) -=
                    i128::from(allocation.amount);
            }
        }
        let fits = expected.values().all(|&v| Amount::try_from(v).is_ok());

        match try_aggregate(&entries, GROUP) {
            Ok(balances) => {
                prop_assert!(fits);
                prop_assert_eq!(balances.total(), 0);
                for (participant, net) in &expected {
                    prop_assert_eq!(i128::from(balances.get(*participant)), *net);
                }
            }
            Err(_) => prop_assert!(!fits),
        }
    }

    /// Totals of near-limit balances are summed without wrapping.
    #[test]
    fn prop_total_never_wraps(values in prop::collection::vec(near_limit(), 0..8)) {
        let expected: i128 = values.iter().map(|&v| i128::from(v)).sum();
        let balances: Balances = values
            .iter()
            .enumerate()
            .map(|(idx, &v)| (ParticipantId(idx as u32), v))
            .collect();
        prop_assert_eq!(balances.total(), expected);
        prop_assert_eq!(balances.is_balanced(), expected == 0);
    }
}
