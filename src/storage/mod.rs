//! Account and ledger storage.
//!
//! The service only talks to the [`AccountStore`] and [`TransactionStore`]
//! traits; the in-memory implementations here satisfy their contracts and a
//! durable backend can slot in behind the same traits.

mod account_store;
mod error;
mod transaction_store;

pub use account_store::*;
pub use error::*;
pub use transaction_store::*;
