//! Ledger models for CSV parsing and the engine's input records.

use crate::error::{EngineError, Result};
use crate::money::Amount;
use crate::split::SplitKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expense identifier, unique across all groups.
pub type EntryId = u64;

/// Opaque participant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParticipantId(pub u32);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settlement domain identifier (one expense group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant's obligation within a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub participant: ParticipantId,
    pub amount: Amount,
}

impl Allocation {
    pub fn new(participant: ParticipantId, amount: Amount) -> Self {
        Allocation {
            participant,
            amount,
        }
    }
}

/// One recorded expense: who paid, how much, and who owes what.
///
/// # Invariants
///
/// Callers must guarantee that the allocation amounts sum exactly to
/// `amount`. The aggregator trusts this and does not re-check it; use
/// [`LedgerEntry::is_consistent`] upstream when the source is untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub scope: GroupId,
    pub payer: ParticipantId,
    pub amount: Amount,
    pub allocations: Vec<Allocation>,
}

impl LedgerEntry {
    pub fn new(
        id: EntryId,
        scope: GroupId,
        payer: ParticipantId,
        amount: Amount,
        allocations: Vec<Allocation>,
    ) -> Self {
        LedgerEntry {
            id,
            scope,
            payer,
            amount,
            allocations,
        }
    }

    /// Sum of all allocation amounts.
    pub fn allocated(&self) -> Amount {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    /// Returns `true` if the allocations sum exactly to the entry total.
    pub fn is_consistent(&self) -> bool {
        self.allocated() == self.amount
    }
}

/// Raw ledger record as read from CSV.
///
/// Every column except `type` is optional at this level; which ones are
/// required depends on the record type and is checked in [`LedgerRecord::parse`].
#[derive(Debug, Deserialize)]
pub struct LedgerRecord {
    /// Record type: member, expense, share, delete
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub group: Option<u32>,

    #[serde(default)]
    pub expense: Option<u64>,

    #[serde(default)]
    pub participant: Option<u32>,

    /// Minor units for expenses and exact shares, whole percent for percentage shares
    #[serde(default)]
    pub amount: Option<String>,

    /// Split type for expense rows: equal, percentage, exact
    #[serde(default)]
    pub split: Option<String>,
}

impl LedgerRecord {
    /// Parses the raw CSV record into a typed event.
    pub fn parse(&self, row: usize) -> Result<LedgerEvent> {
        let kind = self.kind.trim().to_lowercase();
        let group = GroupId(self.require(self.group, "group", row)?);

        match kind.as_str() {
            "member" => Ok(LedgerEvent::Member {
                group,
                participant: ParticipantId(self.require(self.participant, "participant", row)?),
            }),
            "expense" => {
                let split = match self.split.as_deref().map(str::trim) {
                    None | Some("") => SplitKind::Equal,
                    Some(s) => s.parse().map_err(|e: EngineError| EngineError::InvalidRecord {
                        row,
                        message: e.to_string(),
                    })?,
                };
                Ok(LedgerEvent::Expense {
                    group,
                    entry: self.require(self.expense, "expense", row)?,
                    payer: ParticipantId(self.require(self.participant, "participant", row)?),
                    amount: self.parse_amount(row)?,
                    split,
                })
            }
            "share" => Ok(LedgerEvent::Share {
                group,
                entry: self.require(self.expense, "expense", row)?,
                participant: ParticipantId(self.require(self.participant, "participant", row)?),
                value: self.parse_amount(row)?,
            }),
            "delete" => Ok(LedgerEvent::Delete {
                group,
                entry: self.require(self.expense, "expense", row)?,
            }),
            other => Err(EngineError::InvalidRecord {
                row,
                message: format!("unknown record type '{}'", other),
            }),
        }
    }

    fn require<T>(&self, value: Option<T>, column: &str, row: usize) -> Result<T> {
        value.ok_or_else(|| EngineError::InvalidRecord {
            row,
            message: format!("missing {} for '{}' record", column, self.kind.trim()),
        })
    }

    /// Parses the amount column as an integer count of minor units.
    fn parse_amount(&self, row: usize) -> Result<Amount> {
        let raw = self
            .amount
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::InvalidRecord {
                row,
                message: format!("missing amount for '{}' record", self.kind.trim()),
            })?;
        raw.parse::<Amount>().map_err(|e| EngineError::InvalidRecord {
            row,
            message: format!("invalid amount '{}': {}", raw, e),
        })
    }
}

/// A parsed ledger event ready for the expense book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// Adds a participant to a group.
    Member {
        group: GroupId,
        participant: ParticipantId,
    },

    /// Opens an expense paid by `payer`; shares follow on subsequent rows.
    Expense {
        group: GroupId,
        entry: EntryId,
        payer: ParticipantId,
        amount: Amount,
        split: SplitKind,
    },

    /// One share of the currently open expense.
    Share {
        group: GroupId,
        entry: EntryId,
        participant: ParticipantId,
        value: Amount,
    },

    /// Soft-deletes a recorded expense.
    Delete { group: GroupId, entry: EntryId },
}
