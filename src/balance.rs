//! Balance aggregation: reducing a ledger into one net amount per participant.
//!
//! Positive balances are net creditors (owed money), negative balances are
//! net debtors. For a ledger whose entries each allocate exactly their total,
//! the balances of a group always sum to zero.

use crate::error::{EngineError, Result};
use crate::ledger::{GroupId, LedgerEntry, ParticipantId};
use crate::money::Amount;
use crate::settlement::Transfer;
use log::warn;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Net balances of one settlement domain.
///
/// Backed by a `HashMap`, so iteration order is arbitrary. Use
/// [`Balances::sorted`] whenever order matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    amounts: HashMap<ParticipantId, Amount>,
}

/// Reduces `entries` belonging to `scope` into net balances.
///
/// The payer of each entry is credited with its total and every allocated
/// participant is debited with their share. A payer who also carries a
/// share simply nets out. Entries from other scopes are ignored.
///
/// No validation happens here: entries whose allocations do not sum to
/// their total produce balances that do not sum to zero. Positions are
/// accumulated in `i128`, so intermediate sums never overflow; a net
/// balance outside the `i64` range is clamped and logged. Use
/// [`try_aggregate`] to reject such a ledger instead.
pub fn aggregate<'a, I>(entries: I, scope: GroupId) -> Balances
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let amounts = net_positions(entries, scope)
        .into_iter()
        .map(|(participant, net)| {
            let amount = Amount::try_from(net).unwrap_or_else(|_| {
                warn!(
                    "Net balance {} of participant {} in group {} exceeds the i64 range, clamping",
                    net, participant, scope
                );
                if net > 0 {
                    Amount::MAX
                } else {
                    Amount::MIN
                }
            });
            (participant, amount)
        })
        .collect();

    Balances { amounts }
}

/// Like [`aggregate`], but fails with [`EngineError::AmountOverflow`] when a
/// net balance does not fit in an `i64`.
pub fn try_aggregate<'a, I>(entries: I, scope: GroupId) -> Result<Balances>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let amounts = net_positions(entries, scope)
        .into_iter()
        .map(|(participant, net)| {
            Amount::try_from(net)
                .map(|amount| (participant, amount))
                .map_err(|_| {
                    EngineError::AmountOverflow(format!(
                        "net balance {} of participant {} in group {}",
                        net, participant, scope
                    ))
                })
        })
        .collect::<Result<HashMap<_, _>>>()?;

    Ok(Balances { amounts })
}

fn net_positions<'a, I>(entries: I, scope: GroupId) -> HashMap<ParticipantId, i128>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut positions: HashMap<ParticipantId, i128> = HashMap::new();

    for entry in entries.into_iter().filter(|e| e.scope == scope) {
        *positions.entry(entry.payer).or_insert(0) += i128::from(entry.amount);
        for allocation in &entry.allocations {
            *positions.entry(allocation.participant).or_insert(0) -=
                i128::from(allocation.amount);
        }
    }

    positions
}

impl Balances {
    pub fn new() -> Self {
        Balances {
            amounts: HashMap::new(),
        }
    }

    fn checked_adjust(&mut self, participant: ParticipantId, delta: Amount) -> Result<()> {
        let balance = self.amounts.entry(participant).or_insert(0);
        match balance.checked_add(delta) {
            Some(next) => {
                *balance = next;
                Ok(())
            }
            None => Err(EngineError::AmountOverflow(format!(
                "balance {} of participant {} adjusted by {}",
                balance, participant, delta
            ))),
        }
    }

    /// Balance of `participant`; absent participants are settled at zero.
    pub fn get(&self, participant: ParticipantId) -> Amount {
        self.amounts.get(&participant).copied().unwrap_or(0)
    }

    /// Returns `true` if the participant appeared in at least one entry.
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.amounts.contains_key(&participant)
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Signed sum of all balances. Zero for a consistent ledger.
    ///
    /// Summed in `i128`: balances near the `i64` limits may cancel out.
    pub fn total(&self) -> i128 {
        self.amounts.values().map(|&a| i128::from(a)).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total() == 0
    }

    /// Returns `true` if every balance is zero (nothing left to settle).
    pub fn is_settled(&self) -> bool {
        self.amounts.values().all(|&a| a == 0)
    }

    pub fn status(&self, participant: ParticipantId) -> BalanceStatus {
        BalanceStatus::of(self.get(participant))
    }

    /// Unordered view of the underlying balances.
    pub fn iter(&self) -> impl Iterator<Item = (ParticipantId, Amount)> + '_ {
        self.amounts.iter().map(|(&p, &a)| (p, a))
    }

    /// Balances ordered by participant id.
    pub fn sorted(&self) -> Vec<(ParticipantId, Amount)> {
        let mut out: Vec<_> = self.iter().collect();
        out.sort_by_key(|&(participant, _)| participant);
        out
    }

    /// Returns a copy with every transfer applied: the payer's balance rises
    /// and the payee's falls by the transfer amount.
    pub fn apply(&self, transfers: &[Transfer]) -> Result<Balances> {
        let mut out = self.clone();
        for transfer in transfers {
            let outgoing = transfer.amount.checked_neg().ok_or_else(|| {
                EngineError::AmountOverflow(format!("transfer amount {}", transfer.amount))
            })?;
            out.checked_adjust(transfer.from, transfer.amount)?;
            out.checked_adjust(transfer.to, outgoing)?;
        }
        Ok(out)
    }
}

impl FromIterator<(ParticipantId, Amount)> for Balances {
    /// Collects balances, summing repeated participants. Sums beyond the
    /// `i64` range saturate.
    fn from_iter<T: IntoIterator<Item = (ParticipantId, Amount)>>(iter: T) -> Self {
        let mut amounts: HashMap<ParticipantId, Amount> = HashMap::new();
        for (participant, amount) in iter {
            let balance = amounts.entry(participant).or_insert(0);
            *balance = balance.saturating_add(amount);
        }
        Balances { amounts }
    }
}

/// Sign of a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Creditor,
    Debtor,
    Settled,
}

impl BalanceStatus {
    pub fn of(amount: Amount) -> Self {
        match amount {
            a if a > 0 => BalanceStatus::Creditor,
            a if a < 0 => BalanceStatus::Debtor,
            _ => BalanceStatus::Settled,
        }
    }
}

impl fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BalanceStatus::Creditor => "creditor",
            BalanceStatus::Debtor => "debtor",
            BalanceStatus::Settled => "settled",
        };
        f.write_str(name)
    }
}

/// A participant's position across every group they belong to.
///
/// Group positions are not netted against each other when summing:
/// `owed_to_participant` adds up the groups where they are a creditor and
/// `participant_owes` the groups where they are a debtor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantSummary {
    pub participant: ParticipantId,
    pub owed_to_participant: Amount,
    pub participant_owes: Amount,
    pub net: Amount,
    pub status: BalanceStatus,
}

impl ParticipantSummary {
    /// Fails with [`EngineError::AmountOverflow`] when either side's sum
    /// leaves the `i64` range.
    pub fn across<'a, I>(participant: ParticipantId, groups: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Balances>,
    {
        let overflow = || {
            EngineError::AmountOverflow(format!(
                "cross-group summary of participant {}",
                participant
            ))
        };
        let mut owed_to_participant: Amount = 0;
        let mut participant_owes: Amount = 0;

        for balances in groups {
            let net_in_group = balances.get(participant);
            if net_in_group > 0 {
                owed_to_participant = owed_to_participant
                    .checked_add(net_in_group)
                    .ok_or_else(overflow)?;
            } else if net_in_group < 0 {
                let owed = net_in_group.checked_neg().ok_or_else(overflow)?;
                participant_owes = participant_owes.checked_add(owed).ok_or_else(overflow)?;
            }
        }

        // both sides are non-negative, so the difference cannot overflow
        let net = owed_to_participant - participant_owes;
        Ok(ParticipantSummary {
            participant,
            owed_to_participant,
            participant_owes,
            net,
            status: BalanceStatus::of(net),
        })
    }
}
