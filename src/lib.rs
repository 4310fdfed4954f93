pub mod application;
pub mod cli;
pub mod domain;
pub mod io;
pub mod storage;
pub mod telemetry;

pub use application::{AppError, LedgerConfig, LedgerService};
pub use domain::*;
pub use storage::{AccountStore, InMemoryAccountStore, InMemoryTransactionStore, TransactionStore};
