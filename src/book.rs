//! Expense book: the ledger store that feeds the settlement engine.
//!
//! Processes ledger records in the order they are received, validating
//! membership and splits before an expense becomes a [`LedgerEntry`].
//! Only validated entries reach the aggregator, so every group snapshot
//! taken from the book satisfies the allocation-sum invariant.

use crate::balance::{aggregate, try_aggregate, Balances, ParticipantSummary};
use crate::error::{EngineError, Result};
use crate::ledger::{EntryId, GroupId, LedgerEntry, LedgerEvent, LedgerRecord, ParticipantId};
use crate::money::{Amount, MajorUnits};
use crate::settlement::{minimize, minimize_strict, Transfer};
use crate::split::{SplitKind, SplitRule};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Write};

/// A recorded expense and its soft-delete flag.
#[derive(Debug, Clone)]
struct StoredEntry {
    entry: LedgerEntry,
    deleted: bool,
}

/// An expense whose share rows are still being read.
#[derive(Debug)]
struct PendingExpense {
    row: usize,
    group: GroupId,
    entry: EntryId,
    payer: ParticipantId,
    amount: Amount,
    split: SplitKind,
    shares: Vec<(ParticipantId, Amount)>,
}

/// Group memberships and expenses, plus the reports derived from them.
///
/// # Output Ordering
///
/// All reports are sorted by group id, then by participant id (balances,
/// summaries) or emission order (settlements).
pub struct ExpenseBook {
    /// Members of each group in join order.
    members: HashMap<GroupId, Vec<ParticipantId>>,

    /// Expenses indexed by their globally unique id.
    entries: HashMap<EntryId, StoredEntry>,

    /// Expense currently collecting share rows.
    pending: Option<PendingExpense>,
}

impl ExpenseBook {
    /// Creates a new empty book.
    pub fn new() -> Self {
        ExpenseBook {
            members: HashMap::new(),
            entries: HashMap::new(),
            pending: None,
        }
    }

    /// Processes ledger records from a CSV reader in streaming fashion.
    ///
    /// Invalid records are logged at warn level and skipped. An expense is
    /// committed once the next non-share record arrives or input ends.
    pub fn process_csv<R: Read>(&mut self, reader: R) -> Result<()> {
        let mut csv_reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (row_idx, result) in csv_reader.deserialize::<LedgerRecord>().enumerate() {
            let row_num = row_idx + 2; // 1-indexed, accounting for header row

            match result {
                Ok(record) => match record.parse(row_num) {
                    Ok(event) => {
                        if let Err(e) = self.process_event(event, row_num) {
                            warn!("Row {}: {}", row_num, e);
                        }
                    }
                    Err(e) => warn!("{}", e),
                },
                Err(e) => {
                    warn!("Row {}: CSV parse error: {}", row_num, e);
                }
            }
        }

        self.commit_pending();
        Ok(())
    }

    /// Applies a single parsed event. Any record other than a share first
    /// commits the open expense.
    fn process_event(&mut self, event: LedgerEvent, row: usize) -> Result<()> {
        match event {
            LedgerEvent::Share {
                group,
                entry,
                participant,
                value,
            } => match self.pending.as_mut() {
                Some(p) if p.entry == entry && p.group == group => {
                    p.shares.push((participant, value));
                }
                _ => {
                    return Err(EngineError::InvalidRecord {
                        row,
                        message: format!("share for expense {} has no open expense", entry),
                    });
                }
            },
            LedgerEvent::Member { group, participant } => {
                self.commit_pending();
                if self.add_member(group, participant) {
                    debug!("Row {}: Added participant {} to group {}", row, participant, group);
                }
            }
            LedgerEvent::Expense {
                group,
                entry,
                payer,
                amount,
                split,
            } => {
                self.commit_pending();
                self.check_new_expense(group, entry, payer, amount, row)?;
                self.pending = Some(PendingExpense {
                    row,
                    group,
                    entry,
                    payer,
                    amount,
                    split,
                    shares: Vec::new(),
                });
            }
            LedgerEvent::Delete { group, entry } => {
                self.commit_pending();
                if self.delete_expense(group, entry)? {
                    debug!("Row {}: Deleted expense {} in group {}", row, entry, group);
                } else {
                    debug!("Row {}: Expense {} already deleted, ignoring", row, entry);
                }
            }
        }

        Ok(())
    }

    /// Commits the open expense, if any, logging a rejection.
    fn commit_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let rule = match pending.split {
            SplitKind::Equal => {
                if !pending.shares.is_empty() {
                    debug!(
                        "Row {}: Ignoring {} share rows for equal split expense {}",
                        pending.row,
                        pending.shares.len(),
                        pending.entry
                    );
                }
                SplitRule::Equal(self.members_of(pending.group).to_vec())
            }
            SplitKind::Percentage => SplitRule::Percentage(pending.shares),
            SplitKind::Exact => SplitRule::Exact(pending.shares),
        };

        if let Err(e) = self.record_expense(
            pending.group,
            pending.entry,
            pending.payer,
            pending.amount,
            &rule,
            pending.row,
        ) {
            warn!("Row {}: Rejected expense {}: {}", pending.row, pending.entry, e);
        }
    }

    /// Adds `participant` to `group`. Returns `false` if already a member.
    pub fn add_member(&mut self, group: GroupId, participant: ParticipantId) -> bool {
        let members = self.members.entry(group).or_default();
        if members.contains(&participant) {
            return false;
        }
        members.push(participant);
        true
    }

    /// Members of `group` in join order.
    pub fn members_of(&self, group: GroupId) -> &[ParticipantId] {
        self.members.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_member(&self, group: GroupId, participant: ParticipantId) -> bool {
        self.members_of(group).contains(&participant)
    }

    fn check_new_expense(
        &self,
        group: GroupId,
        entry: EntryId,
        payer: ParticipantId,
        amount: Amount,
        row: usize,
    ) -> Result<()> {
        if self.entries.contains_key(&entry) {
            return Err(EngineError::DuplicateEntry { entry, row });
        }
        if amount <= 0 {
            return Err(EngineError::InvalidRecord {
                row,
                message: format!("expense {} amount must be greater than 0", entry),
            });
        }
        if !self.is_member(group, payer) {
            return Err(EngineError::InvalidRecord {
                row,
                message: format!("payer {} is not a member of group {}", payer, group),
            });
        }
        Ok(())
    }

    /// Validates and records an expense.
    ///
    /// The payer and every share holder must be members of `group`, and the
    /// split must allocate exactly `amount`. Record errors report row 0.
    pub fn add_expense(
        &mut self,
        group: GroupId,
        entry: EntryId,
        payer: ParticipantId,
        amount: Amount,
        rule: &SplitRule,
    ) -> Result<()> {
        self.record_expense(group, entry, payer, amount, rule, 0)
    }

    fn record_expense(
        &mut self,
        group: GroupId,
        entry: EntryId,
        payer: ParticipantId,
        amount: Amount,
        rule: &SplitRule,
        row: usize,
    ) -> Result<()> {
        self.check_new_expense(group, entry, payer, amount, row)?;

        let allocations = rule.allocate(amount)?;
        if let Some(outsider) = allocations
            .iter()
            .map(|a| a.participant)
            .find(|&p| !self.is_member(group, p))
        {
            return Err(EngineError::Split(format!(
                "participant {} is not a member of group {}",
                outsider, group
            )));
        }

        let ledger_entry = LedgerEntry::new(entry, group, payer, amount, allocations);
        let existing = self.entries(group);
        try_aggregate(existing.iter().chain(std::iter::once(&ledger_entry)), group)?;

        debug!(
            "Recorded expense {} in group {}: {} paid {} ({} split)",
            entry,
            group,
            payer,
            amount,
            rule.kind()
        );
        self.entries.insert(
            entry,
            StoredEntry {
                entry: ledger_entry,
                deleted: false,
            },
        );
        Ok(())
    }

    /// Soft-deletes an expense. Returns `false` if it was already deleted.
    ///
    /// Refused when removing the expense would push a group balance out of
    /// the `i64` range.
    pub fn delete_expense(&mut self, group: GroupId, entry: EntryId) -> Result<bool> {
        let already_deleted = self
            .entries
            .get(&entry)
            .filter(|s| s.entry.scope == group)
            .map(|s| s.deleted)
            .ok_or(EngineError::UnknownEntry { entry, group: group.0 })?;

        if already_deleted {
            return Ok(false);
        }

        let remaining = self.entries(group);
        try_aggregate(remaining.iter().filter(|e| e.id != entry), group)?;

        if let Some(stored) = self.entries.get_mut(&entry) {
            stored.deleted = true;
        }
        Ok(true)
    }

    /// Point-in-time snapshot of the live (not deleted) entries of `group`,
    /// ordered by expense id.
    pub fn entries(&self, group: GroupId) -> Vec<LedgerEntry> {
        let mut out: Vec<LedgerEntry> = self
            .entries
            .values()
            .filter(|s| !s.deleted && s.entry.scope == group)
            .map(|s| s.entry.clone())
            .collect();
        out.sort_by_key(|e| e.id);
        out
    }

    /// Every group with members or expenses, ascending.
    pub fn groups(&self) -> Vec<GroupId> {
        let groups: BTreeSet<GroupId> = self
            .members
            .keys()
            .copied()
            .chain(self.entries.values().map(|s| s.entry.scope))
            .collect();
        groups.into_iter().collect()
    }

    /// Every participant that belongs to at least one group, ascending.
    pub fn participants(&self) -> Vec<ParticipantId> {
        let participants: BTreeSet<ParticipantId> =
            self.members.values().flatten().copied().collect();
        participants.into_iter().collect()
    }

    pub fn balances(&self, group: GroupId) -> Balances {
        aggregate(&self.entries(group), group)
    }

    pub fn settlements(&self, group: GroupId) -> Vec<Transfer> {
        minimize(&self.balances(group))
    }

    pub fn settlements_strict(&self, group: GroupId) -> Result<Vec<Transfer>> {
        minimize_strict(&self.balances(group))
    }

    /// Position of `participant` across every group they are a member of.
    pub fn summary(&self, participant: ParticipantId) -> Result<ParticipantSummary> {
        let balances: Vec<Balances> = self
            .groups()
            .into_iter()
            .filter(|&g| self.is_member(g, participant))
            .map(|g| self.balances(g))
            .collect();
        ParticipantSummary::across(participant, &balances)
    }

    /// Writes per-group net balances to CSV.
    pub fn write_balances<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["group", "participant", "balance", "status", "display"])?;

        for group in self.groups() {
            let balances = self.balances(group);
            for (participant, amount) in balances.sorted() {
                csv_writer.write_record([
                    group.to_string(),
                    participant.to_string(),
                    amount.to_string(),
                    balances.status(participant).to_string(),
                    MajorUnits::from_minor(amount).to_string(),
                ])?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the settlement transfers of every group to CSV.
    ///
    /// With `strict`, the first group whose balances do not sum to zero
    /// aborts the report.
    pub fn write_settlements<W: Write>(&self, writer: W, strict: bool) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["group", "from", "to", "amount", "display"])?;

        for group in self.groups() {
            let transfers = if strict {
                self.settlements_strict(group)?
            } else {
                self.settlements(group)
            };
            for transfer in transfers {
                csv_writer.write_record([
                    group.to_string(),
                    transfer.from.to_string(),
                    transfer.to.to_string(),
                    transfer.amount.to_string(),
                    MajorUnits::from_minor(transfer.amount).to_string(),
                ])?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Writes the cross-group summary of every participant to CSV.
    pub fn write_summaries<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["participant", "owed_to", "owes", "net", "status"])?;

        for participant in self.participants() {
            let summary = self.summary(participant)?;
            csv_writer.write_record([
                participant.to_string(),
                summary.owed_to_participant.to_string(),
                summary.participant_owes.to_string(),
                summary.net.to_string(),
                summary.status.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

impl Default for ExpenseBook {
    fn default() -> Self {
        Self::new()
    }
}
