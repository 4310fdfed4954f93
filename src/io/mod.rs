//! Batch input and ledger export.

pub mod export;
pub mod import;

pub use export::{Exporter, LedgerSnapshot};
pub use import::{
    BatchError, BatchOptions, BatchReport, BatchRunner, Operation, parse_operations_csv,
};
