//! # Settle Engine
//!
//! Computes who owes whom in a shared-expense ledger: net balances per
//! participant, then a short list of transfers that settles them all.
//!
//! ## Design Principles
//!
//! - **Integer money**: every amount is an exact `i64` of minor units
//! - **Pure engine**: [`aggregate`] and [`minimize`] take their data as
//!   arguments and hold no state between calls
//! - **Strict invariants**: validated entries allocate exactly their total,
//!   so group balances sum to zero
//! - **Deterministic output**: ties and reports are ordered by id
//!
//! ## Example
//!
//! ```no_run
//! use settle_engine::ExpenseBook;
//! use std::io::Cursor;
//!
//! let csv = "type,group,expense,participant,amount,split\n\
//!            member,1,,1,,\nmember,1,,2,,\nexpense,1,1,1,300,equal\n";
//! let mut book = ExpenseBook::new();
//! book.process_csv(Cursor::new(csv)).unwrap();
//! book.write_settlements(std::io::stdout(), false).unwrap();
//! ```

pub mod balance;
pub mod book;
pub mod error;
pub mod ledger;
pub mod money;
pub mod settlement;
pub mod split;

#[cfg(test)]
mod props;

pub use balance::{aggregate, try_aggregate, BalanceStatus, Balances, ParticipantSummary};
pub use book::ExpenseBook;
pub use error::{EngineError, Result};
pub use ledger::{
    Allocation, EntryId, GroupId, LedgerEntry, LedgerEvent, LedgerRecord, ParticipantId,
};
pub use money::{Amount, MajorUnits};
pub use settlement::{minimize, minimize_strict, Transfer};
pub use split::{SplitKind, SplitRule};
