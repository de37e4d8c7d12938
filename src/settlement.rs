//! Settlement minimization: turning net balances into point-to-point transfers.
//!
//! Greedy largest-first matching (O(n log n)):
//!
//! 1. Split participants into creditors (balance > 0) and debtors (balance < 0).
//! 2. Sort both by magnitude descending, then by participant id ascending.
//! 3. Match the current largest debtor with the current largest creditor and
//!    transfer `min(debt, credit)`.
//! 4. Advance whichever side reached zero (both on an exact match).
//!
//! This yields at most `creditors + debtors - 1` transfers. It is a heuristic:
//! the true minimum is a subset-partition problem and NP-hard in general.
//! Callers may rely on the exact order and grouping produced here.

use crate::balance::Balances;
use crate::error::{EngineError, Result};
use crate::ledger::ParticipantId;
use crate::money::Amount;
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;

/// A single payment from a debtor to a creditor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub from: ParticipantId,
    pub to: ParticipantId,
    /// Always strictly positive.
    pub amount: Amount,
}

impl Transfer {
    pub fn new(from: ParticipantId, to: ParticipantId, amount: Amount) -> Self {
        Transfer { from, to, amount }
    }
}

/// Remaining magnitude for one side of the matching.
///
/// Unsigned so that an `i64::MIN` debt has a representable magnitude.
#[derive(Debug)]
struct Position {
    participant: ParticipantId,
    remaining: u64,
}

/// Largest magnitude first; equal magnitudes fall back to participant id.
fn by_magnitude(a: &Position, b: &Position) -> Ordering {
    b.remaining
        .cmp(&a.remaining)
        .then_with(|| a.participant.cmp(&b.participant))
}

/// Computes an ordered list of transfers that settles `balances`.
///
/// Zero balances are ignored. If `balances` does not sum to zero the matching
/// stops when either side runs out and the residual is silently left out of
/// the result (a warning is logged). Use [`minimize_strict`] to reject such
/// input instead.
///
/// # Examples
///
/// ```
/// use settle_engine::{minimize, Balances, ParticipantId, Transfer};
///
/// let (a, b, c) = (ParticipantId(1), ParticipantId(2), ParticipantId(3));
/// let balances: Balances = vec![(a, 500), (b, -200), (c, -300)].into_iter().collect();
///
/// assert_eq!(
///     minimize(&balances),
///     vec![Transfer::new(c, a, 300), Transfer::new(b, a, 200)]
/// );
/// ```
pub fn minimize(balances: &Balances) -> Vec<Transfer> {
    let mut creditors = Vec::new();
    let mut debtors = Vec::new();

    for (participant, amount) in balances.iter() {
        match amount.cmp(&0) {
            Ordering::Greater => creditors.push(Position {
                participant,
                remaining: amount.unsigned_abs(),
            }),
            Ordering::Less => debtors.push(Position {
                participant,
                remaining: amount.unsigned_abs(),
            }),
            Ordering::Equal => {}
        }
    }

    creditors.sort_by(by_magnitude);
    debtors.sort_by(by_magnitude);

    let mut transfers = Vec::with_capacity(creditors.len() + debtors.len());
    let (mut i, mut j) = (0, 0);

    while i < debtors.len() && j < creditors.len() {
        let debtor = &mut debtors[i];
        let creditor = &mut creditors[j];

        let amount = debtor.remaining.min(creditor.remaining);
        debug!(
            "Transfer {} from {} to {}",
            amount, debtor.participant, creditor.participant
        );
        // bounded by a creditor's positive i64 balance
        let transfer = amount as Amount;
        transfers.push(Transfer::new(debtor.participant, creditor.participant, transfer));

        debtor.remaining -= amount;
        creditor.remaining -= amount;

        if debtor.remaining == 0 {
            i += 1;
        }
        if creditor.remaining == 0 {
            j += 1;
        }
    }

    if i < debtors.len() || j < creditors.len() {
        let unpaid: u128 = debtors[i..].iter().map(|d| u128::from(d.remaining)).sum();
        let uncollected: u128 = creditors[j..].iter().map(|c| u128::from(c.remaining)).sum();
        warn!(
            "Balances do not sum to zero: {} owed and {} due left unsettled",
            unpaid, uncollected
        );
    }

    transfers
}

/// Like [`minimize`], but fails with [`EngineError::UnbalancedLedger`] when
/// the balances do not sum to zero instead of returning a partial settlement.
pub fn minimize_strict(balances: &Balances) -> Result<Vec<Transfer>> {
    let residual = balances.total();
    if residual != 0 {
        return Err(EngineError::UnbalancedLedger { residual });
    }
    Ok(minimize(balances))
}
