// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendy_card_rs::tap::{TapError, TapEvent, TapSource};
use spendy_card_rs::{ConfirmationFlow, Direction, FlowState, Ledger, parse_amount};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Spendy Card - Replay confirmation flows from a CSV script
///
/// Each row runs one complete spend or reload flow against a shared card
/// balance, with the NFC tap outcome scripted per row. Outcomes are written
/// to stdout as CSV.
#[derive(Parser, Debug)]
#[command(name = "spendy-card-rs")]
#[command(about = "Replays card confirmation flows from a CSV script", long_about = None)]
struct Args {
    /// Path to CSV file with flows
    ///
    /// Expected format: flow,amount,tap
    /// Example: cargo run -- flows.csv > outcomes.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Initial card balance in dollars
    #[arg(long, default_value = "24.00")]
    balance: Decimal,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let ledger = match Ledger::new(args.balance) {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            eprintln!("Invalid initial balance '{}': {}", args.balance, e);
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            process::exit(1);
        }
    };

    let outcomes = match process_flows(BufReader::new(file), &ledger, &runtime) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("Error processing flows: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_outcomes(&outcomes, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Scripted tap outcome for one row.
#[derive(Debug, Clone, Copy)]
enum TapOutcome {
    Ok,
    Cancel,
    Error,
}

/// Tap source that resolves immediately with a scripted outcome.
struct ScriptedTap {
    outcome: TapOutcome,
}

impl TapSource for ScriptedTap {
    type Wait = std::future::Ready<Result<TapEvent, TapError>>;

    fn begin(&self) -> Self::Wait {
        std::future::ready(match self.outcome {
            TapOutcome::Ok => Ok(TapEvent),
            TapOutcome::Cancel => Err(TapError::Cancelled),
            TapOutcome::Error => Err(TapError::Failed("scripted technology error".into())),
        })
    }

    fn cancel(&self) {}
}

/// Raw CSV record matching the input format.
///
/// Fields: `flow, amount, tap`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    flow: String,
    amount: String,
    tap: String,
}

impl CsvRecord {
    /// Splits the record into direction, raw amount text and tap outcome.
    ///
    /// Returns `None` for unknown flow or tap values; the amount stays text
    /// so that rejected entries can be reported instead of skipped.
    fn into_script(self) -> Option<(Direction, String, TapOutcome)> {
        let direction = match self.flow.to_lowercase().as_str() {
            "spend" => Direction::Spend,
            "reload" => Direction::Reload,
            _ => return None,
        };
        let tap = match self.tap.to_lowercase().as_str() {
            "ok" => TapOutcome::Ok,
            "cancel" => TapOutcome::Cancel,
            "error" => TapOutcome::Error,
            _ => return None,
        };
        Some((direction, self.amount, tap))
    }
}

/// One row of the output report.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct OutcomeRecord {
    flow: String,
    amount: String,
    outcome: String,
    balance: Decimal,
}

/// Runs one complete confirmation flow and reports its outcome.
fn run_flow(
    ledger: &Arc<Ledger>,
    runtime: &Runtime,
    direction: Direction,
    amount_text: &str,
    tap: TapOutcome,
) -> OutcomeRecord {
    let record = |outcome: String| OutcomeRecord {
        flow: direction.to_string(),
        amount: amount_text.trim().to_string(),
        outcome,
        balance: ledger.read(),
    };

    let amount = match parse_amount(amount_text) {
        Ok(amount) => amount,
        Err(e) => return record(format!("rejected: {}", e)),
    };

    let flow = ConfirmationFlow::new(Arc::clone(ledger), ScriptedTap { outcome: tap });
    let outcome = match flow.start(direction, amount) {
        // A failed gate is a terminal flow state, not a structural reject.
        Err(_) => match flow.state() {
            FlowState::Failed { reason } => format!("failed: {}", reason),
            _ => "rejected".to_string(),
        },
        Ok(()) => match runtime.block_on(flow.confirm_tap()) {
            FlowState::Completed { .. } => "completed".to_string(),
            FlowState::Cancelled => "cancelled".to_string(),
            FlowState::Failed { reason } => format!("failed: {}", reason),
            state => format!("{:?}", state),
        },
    };
    record(outcome)
}

/// Process flows from a CSV reader against a shared ledger.
///
/// Malformed rows (unknown flow or tap values, wrong shape) are silently
/// skipped; rejected amounts produce an outcome row so the report shows why
/// the balance did not move.
///
/// # CSV Format
///
/// Expected columns: `flow, amount, tap`
/// - `flow`: `spend` or `reload`
/// - `amount`: dollar amount, optional leading `$`
/// - `tap`: scripted tap outcome (`ok`, `cancel`, `error`)
///
/// # Example
///
/// ```csv
/// flow,amount,tap
/// spend,10.00,ok
/// reload,$15.00,cancel
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
fn process_flows<R: Read>(
    reader: R,
    ledger: &Arc<Ledger>,
    runtime: &Runtime,
) -> Result<Vec<OutcomeRecord>, csv::Error> {
    let mut outcomes = Vec::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(row) => {
                let Some((direction, amount, tap)) = row.into_script() else {
                    #[cfg(debug_assertions)]
                    eprintln!("Skipping invalid flow record");
                    continue;
                };
                outcomes.push(run_flow(ledger, runtime, direction, &amount, tap));
            }
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        }
    }

    Ok(outcomes)
}

/// Write the outcome report to a CSV writer.
///
/// # CSV Format
///
/// Columns: `flow, amount, outcome, balance`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_outcomes<W: Write>(outcomes: &[OutcomeRecord], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for outcome in outcomes {
        wtr.serialize(outcome)?;
    }

    wtr.flush()?;
    Ok(())
}
