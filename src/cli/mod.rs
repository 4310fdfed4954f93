use std::fs::File;
use std::io::{self, BufReader, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::application::{LedgerConfig, LedgerService};
use crate::domain::{format_cents, IntegrityReport};
use crate::io::{parse_operations_csv, BatchOptions, BatchReport, BatchRunner, Exporter};

/// Tellerbook - account ledger core
#[derive(Parser)]
#[command(name = "tellerbook")]
#[command(about = "Apply deposits, withdrawals and transfers to an in-memory account ledger")]
#[command(version)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Timeout for a single store call, in milliseconds
    #[arg(long, global = true, default_value_t = 5000)]
    pub store_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a batch of operations to a fresh ledger and print the result
    Run {
        /// CSV file with header `op,account,counterparty,amount,owner_id,owner_name,kind`
        input: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Verify ledger integrity after the batch
        #[arg(long)]
        check: bool,
    },

    /// Parse a batch file without applying it
    Validate {
        /// CSV batch file
        input: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable account table
    Table,
    /// Accounts as CSV
    Csv,
    /// Full snapshot (accounts and ledger) as JSON
    Json,
}

impl Cli {
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig::default().with_store_timeout(Duration::from_millis(self.store_timeout_ms))
    }

    pub async fn run(self) -> Result<()> {
        crate::telemetry::init(self.verbose);
        let config = self.config();

        match self.command {
            Commands::Run {
                input,
                format,
                output,
                check,
            } => {
                let service = LedgerService::in_memory_with_config(config);
                run_batch_command(&service, &input, format, output.as_deref(), check).await?;
            }

            Commands::Validate { input } => {
                let file = open_input(&input)?;
                let (operations, errors) = parse_operations_csv(file);
                println!("{} valid operations", operations.len());
                for error in &errors {
                    println!("  line {}: {}", error.line, error.error);
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} invalid rows in {}", errors.len(), input);
                }
            }
        }

        Ok(())
    }
}

fn open_input(path: &str) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Failed to open batch file {}", path))?;
    Ok(BufReader::new(file))
}

async fn run_batch_command(
    service: &LedgerService,
    input: &str,
    format: OutputFormat,
    output: Option<&str>,
    check: bool,
) -> Result<()> {
    let report = BatchRunner::new(service)
        .run_csv(open_input(input)?, BatchOptions::default())
        .await?;
    print_batch_report(&report);

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path))?,
        ),
        None => Box::new(io::stdout()),
    };
    write_accounts(service, format, writer).await?;

    if check {
        let integrity = service.check_integrity().await?;
        print_integrity_report(&integrity);
        if !integrity.is_healthy() {
            anyhow::bail!("Ledger integrity check failed");
        }
    }

    Ok(())
}

async fn write_accounts<W: Write>(
    service: &LedgerService,
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    let exporter = Exporter::new(service);
    match format {
        OutputFormat::Csv => {
            exporter.export_accounts_csv(writer).await?;
        }
        OutputFormat::Json => {
            exporter.export_full_json(&mut writer).await?;
            writeln!(writer)?;
        }
        OutputFormat::Table => {
            let accounts = service.list_accounts().await?;
            writeln!(
                writer,
                "{:<14} {:<9} {:<20} {:>14}",
                "Account", "Type", "Owner", "Balance"
            )?;
            writeln!(writer, "{}", "-".repeat(60))?;
            for account in &accounts {
                writeln!(
                    writer,
                    "{:<14} {:<9} {:<20} {:>14}",
                    account.account_number,
                    account.account_type,
                    truncate(&account.owner.display_name, 20),
                    format_cents(account.balance)
                )?;
            }
        }
    }
    Ok(())
}

fn print_batch_report(report: &BatchReport) {
    eprintln!("Applied {} operations", report.applied);
    if !report.is_clean() {
        eprintln!("Rejected {} rows:", report.errors.len());
        for error in &report.errors {
            eprintln!("  line {}: {}", error.line, error.error);
        }
    }
}

fn print_integrity_report(report: &IntegrityReport) {
    eprintln!("Accounts:     {}", report.account_count);
    eprintln!("Transactions: {}", report.transaction_count);
    eprintln!("Transfers:    {}", report.transfer_count);
    if report.is_healthy() {
        eprintln!("Ledger is consistent.");
    } else {
        eprintln!("Issues found:");
        for issue in &report.issues {
            eprintln!("  - {}", issue);
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
