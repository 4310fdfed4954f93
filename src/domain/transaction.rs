use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = u64;

/// Links the two legs written by a single transfer.
pub type CorrelationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    /// Whether a signed amount has the sign this type requires.
    pub fn accepts(&self, amount: Cents) -> bool {
        match self {
            TransactionType::Deposit => amount > 0,
            TransactionType::Withdrawal => amount < 0,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry against one account.
/// Entries are immutable once the transaction store has assigned an id;
/// corrections are new entries, never edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// `None` until the transaction store appends it
    pub id: Option<TransactionId>,
    pub account_id: AccountId,
    pub transaction_type: TransactionType,
    /// Signed cents: positive for deposits, negative for withdrawals
    pub amount: Cents,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Shared by both legs of a transfer
    pub correlation_id: Option<CorrelationId>,
}

impl Transaction {
    pub fn new(
        account_id: AccountId,
        transaction_type: TransactionType,
        amount: Cents,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            account_id,
            transaction_type,
            amount,
            description: description.into(),
            timestamp,
            correlation_id: None,
        }
    }

    /// Credit entry for `amount` (positive cents).
    pub fn deposit(
        account_id: AccountId,
        amount: Cents,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Deposit,
            amount,
            description,
            timestamp,
        )
    }

    /// Debit entry for `amount` (positive cents, stored negated).
    pub fn withdrawal(
        account_id: AccountId,
        amount: Cents,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Withdrawal,
            -amount,
            description,
            timestamp,
        )
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}
