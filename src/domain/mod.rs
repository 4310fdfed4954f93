mod account;
mod ledger;
mod money;
mod owner;
mod transaction;

pub use account::*;
pub use ledger::*;
pub use money::*;
pub use owner::*;
pub use transaction::*;
