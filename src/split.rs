//! Split computation: turning an expense total into per-participant shares.
//!
//! Every rule produces allocations that sum exactly to the expense total,
//! using integer arithmetic only. This is the upstream guarantee the
//! balance aggregator relies on.

use crate::error::{EngineError, Result};
use crate::ledger::{Allocation, ParticipantId};
use crate::money::Amount;
use std::fmt;
use std::str::FromStr;

/// Split type named on an expense record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Equal,
    Percentage,
    Exact,
}

impl FromStr for SplitKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "equal" => Ok(SplitKind::Equal),
            "percentage" => Ok(SplitKind::Percentage),
            "exact" => Ok(SplitKind::Exact),
            other => Err(EngineError::Split(format!(
                "unknown split type '{}', expected equal, percentage or exact",
                other
            ))),
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplitKind::Equal => "equal",
            SplitKind::Percentage => "percentage",
            SplitKind::Exact => "exact",
        };
        f.write_str(name)
    }
}

/// A fully specified split, ready to allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitRule {
    /// Equal shares; the first `amount % n` participants carry one extra unit.
    Equal(Vec<ParticipantId>),

    /// Whole-number percentages that must sum to 100. The last participant
    /// absorbs the integer-division remainder.
    Percentage(Vec<(ParticipantId, i64)>),

    /// Exact minor-unit amounts that must sum to the total.
    Exact(Vec<(ParticipantId, Amount)>),
}

impl SplitRule {
    pub fn kind(&self) -> SplitKind {
        match self {
            SplitRule::Equal(_) => SplitKind::Equal,
            SplitRule::Percentage(_) => SplitKind::Percentage,
            SplitRule::Exact(_) => SplitKind::Exact,
        }
    }

    /// Computes allocations for `amount` whose sum is exactly `amount`.
    ///
    /// # Examples
    ///
    /// ```
    /// use settle_engine::{ParticipantId, SplitRule};
    ///
    /// let rule = SplitRule::Equal(vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)]);
    /// let shares: Vec<i64> = rule.allocate(10000).unwrap().iter().map(|a| a.amount).collect();
    /// assert_eq!(shares, vec![3334, 3333, 3333]);
    /// ```
    pub fn allocate(&self, amount: Amount) -> Result<Vec<Allocation>> {
        if amount <= 0 {
            return Err(EngineError::Split(format!(
                "amount must be greater than 0, got {}",
                amount
            )));
        }

        match self {
            SplitRule::Equal(members) => allocate_equal(amount, members),
            SplitRule::Percentage(shares) => allocate_percentage(amount, shares),
            SplitRule::Exact(shares) => allocate_exact(amount, shares),
        }
    }
}

fn allocate_equal(amount: Amount, members: &[ParticipantId]) -> Result<Vec<Allocation>> {
    if members.is_empty() {
        return Err(EngineError::Split("group has no members".to_string()));
    }

    let count = members.len() as i64;
    let base = amount / count;
    let remainder = amount % count;

    Ok(members
        .iter()
        .enumerate()
        .map(|(idx, &participant)| {
            let extra = if (idx as i64) < remainder { 1 } else { 0 };
            Allocation::new(participant, base + extra)
        })
        .collect())
}

fn allocate_percentage(amount: Amount, shares: &[(ParticipantId, i64)]) -> Result<Vec<Allocation>> {
    if shares.is_empty() {
        return Err(EngineError::Split(
            "percentage split needs at least one share".to_string(),
        ));
    }
    if let Some((participant, pct)) = shares.iter().find(|(_, pct)| *pct < 0) {
        return Err(EngineError::Split(format!(
            "negative percentage {} for participant {}",
            pct, participant
        )));
    }

    let total_pct = checked_sum(shares.iter().map(|(_, pct)| *pct))?;
    if total_pct != 100 {
        return Err(EngineError::Split(format!(
            "percentages must sum to 100, got {}",
            total_pct
        )));
    }

    let last = shares.len() - 1;
    let mut allocated: Amount = 0;
    let mut allocations = Vec::with_capacity(shares.len());

    for (idx, &(participant, pct)) in shares.iter().enumerate() {
        let share = if idx == last {
            amount - allocated
        } else {
            amount
                .checked_mul(pct)
                .map(|v| v / 100)
                .ok_or_else(|| overflow(amount))?
        };
        allocated += share;
        allocations.push(Allocation::new(participant, share));
    }

    Ok(allocations)
}

fn allocate_exact(amount: Amount, shares: &[(ParticipantId, Amount)]) -> Result<Vec<Allocation>> {
    if shares.is_empty() {
        return Err(EngineError::Split(
            "exact split needs at least one share".to_string(),
        ));
    }
    if let Some((participant, value)) = shares.iter().find(|(_, value)| *value < 0) {
        return Err(EngineError::Split(format!(
            "negative share {} for participant {}",
            value, participant
        )));
    }

    let total = checked_sum(shares.iter().map(|(_, value)| *value))?;
    if total != amount {
        return Err(EngineError::Split(format!(
            "exact shares sum to {}, expected {}",
            total, amount
        )));
    }

    Ok(shares
        .iter()
        .map(|&(participant, value)| Allocation::new(participant, value))
        .collect())
}

fn checked_sum(mut values: impl Iterator<Item = i64>) -> Result<i64> {
    values.try_fold(0i64, |acc, v| {
        acc.checked_add(v)
            .ok_or_else(|| EngineError::Split("share total overflows".to_string()))
    })
}

fn overflow(amount: Amount) -> EngineError {
    EngineError::Split(format!("amount {} too large to split by percentage", amount))
}
