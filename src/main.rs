//! Settle Engine CLI
//!
//! Reads a shared-expense ledger CSV and writes balances, settlement
//! transfers or per-participant summaries as CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- ledger.csv settlements --strict > transfers.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use settle_engine::{EngineError, ExpenseBook, Result};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

/// Report to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Balances,
    Settlements,
    Summary,
}

impl Command {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "balances" => Ok(Command::Balances),
            "settlements" => Ok(Command::Settlements),
            "summary" => Ok(Command::Summary),
            other => Err(EngineError::UnknownCommand(other.to_string())),
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    if let Some(flag) = args.iter().find(|a| a.starts_with("--") && *a != "--strict") {
        return Err(EngineError::UnknownOption(flag.clone()));
    }
    let strict = args.iter().any(|a| a == "--strict");
    let mut positional = args.iter().filter(|a| *a != "--strict");

    let input_path = positional.next().ok_or(EngineError::MissingArgument)?;
    let command = match positional.next() {
        Some(name) => Command::parse(name)?,
        None => Command::Settlements,
    };

    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let mut book = ExpenseBook::new();
    book.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    match command {
        Command::Balances => book.write_balances(handle)?,
        Command::Settlements => book.write_settlements(handle, strict)?,
        Command::Summary => book.write_summaries(handle)?,
    }

    Ok(())
}
