use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AccountId, CorrelationId, Transaction, TransactionId};

use super::StoreError;

/// Append-only storage for ledger entries.
///
/// Entries are never edited: saving a record that already carries an id
/// returns the stored entry unchanged. Query results are newest first
/// (descending timestamp, later insertion first on ties).
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn save(&self, transaction: Transaction) -> Result<Transaction, StoreError>;

    /// Append several entries as one unit: either all become visible or none do.
    async fn save_all(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn find_all_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Like [`find_all_by_account`](Self::find_all_by_account), limited to
    /// `start..=end`.
    async fn find_all_by_account_and_time_range(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn find_all_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Transaction>, StoreError>;
}

#[derive(Debug, Default)]
struct LedgerTables {
    /// Position `n` holds the entry with id `n + 1`
    entries: Vec<Transaction>,
    by_account: HashMap<AccountId, Vec<usize>>,
}

impl LedgerTables {
    fn stored(&self, id: TransactionId) -> Option<&Transaction> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.entries.get(index)
    }

    fn check(&self, transactions: &[Transaction]) -> Result<(), StoreError> {
        for transaction in transactions {
            match transaction.id {
                Some(id) if self.stored(id).is_none() => {
                    return Err(StoreError::InvalidArgument(format!(
                        "unknown transaction id {}",
                        id
                    )));
                }
                Some(_) => {}
                None if transaction.amount == 0 => {
                    return Err(StoreError::InvalidArgument(
                        "transaction amount must not be zero".to_string(),
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn append(&mut self, mut transaction: Transaction) -> Transaction {
        if let Some(existing) = transaction.id.and_then(|id| self.stored(id)) {
            return existing.clone();
        }

        let index = self.entries.len();
        transaction.id = Some(index as TransactionId + 1);
        self.by_account
            .entry(transaction.account_id)
            .or_default()
            .push(index);
        self.entries.push(transaction.clone());
        transaction
    }

    fn newest_first<F>(&self, account_id: AccountId, mut keep: F) -> Vec<Transaction>
    where
        F: FnMut(&Transaction) -> bool,
    {
        let mut found: Vec<Transaction> = self
            .by_account
            .get(&account_id)
            .into_iter()
            .flatten()
            .rev()
            .map(|&index| &self.entries[index])
            .filter(|t| keep(t))
            .cloned()
            .collect();
        // stable sort keeps later insertions first among equal timestamps
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        found
    }
}

/// In-memory append-only ledger.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    tables: RwLock<LedgerTables>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries ever appended.
    ///
    /// Appends validate before writing, so a poisoned lock still guards a
    /// complete ledger and the count stays accurate.
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn save(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::poisoned("transaction store"))?;

        tables.check(std::slice::from_ref(&transaction))?;
        Ok(tables.append(transaction))
    }

    async fn save_all(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::poisoned("transaction store"))?;

        tables.check(&transactions)?;
        Ok(transactions
            .into_iter()
            .map(|t| tables.append(t))
            .collect())
    }

    async fn find_all_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::poisoned("transaction store"))?;

        Ok(tables.newest_first(account_id, |_| true))
    }

    async fn find_all_by_account_and_time_range(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::poisoned("transaction store"))?;

        Ok(tables.newest_first(account_id, |t| t.timestamp >= start && t.timestamp <= end))
    }

    async fn find_all_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Transaction>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::poisoned("transaction store"))?;

        Ok(tables
            .entries
            .iter()
            .filter(|t| t.correlation_id == Some(correlation_id))
            .cloned()
            .collect())
    }
}
