//! Error types for the settlement engine.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during engine operation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid ledger record
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Duplicate expense ID
    #[error("Duplicate expense ID {entry} at row {row}")]
    DuplicateEntry { entry: u64, row: usize },

    /// Expense ID not recorded in the given group
    #[error("Expense {entry} not found in group {group}")]
    UnknownEntry { entry: u64, group: u32 },

    /// Split computation rejected its input
    #[error("Invalid split: {0}")]
    Split(String),

    /// Balances handed to the strict minimizer do not sum to zero
    #[error("Unbalanced ledger: balances sum to {residual}, expected 0")]
    UnbalancedLedger { residual: i128 },

    /// A balance or total left the i64 minor-unit range
    #[error("Amount overflow: {0}")]
    AmountOverflow(String),

    /// Missing input file argument
    #[error("Missing input file argument. Usage: settle-engine <ledger.csv> [balances|settlements|summary] [--strict]")]
    MissingArgument,

    /// Unrecognized CLI command
    #[error("Unknown command '{0}'. Expected one of: balances, settlements, summary")]
    UnknownCommand(String),

    /// Unrecognized CLI flag
    #[error("Unknown option '{0}'. Expected: --strict")]
    UnknownOption(String),
}
