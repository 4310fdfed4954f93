// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tellerbook::domain::{
    Account, AccountId, AccountType, CorrelationId, Owner, OwnerId, Transaction,
};
use tellerbook::storage::{
    AccountStore, InMemoryAccountStore, InMemoryTransactionStore, StoreError, TransactionStore,
};
use tellerbook::{LedgerConfig, LedgerService};

pub fn alice() -> Owner {
    Owner::new(1, "Alice")
}

pub fn bob() -> Owner {
    Owner::new(2, "Bob")
}

/// Test fixture: the two accounts used throughout the scenarios
pub struct StandardAccounts;

impl StandardAccounts {
    /// "12345" (Alice, checking) and "67890" (Bob, checking), both empty
    pub async fn open(service: &LedgerService) -> Result<()> {
        service
            .create_account(alice(), AccountType::Checking, "12345")
            .await?;
        service
            .create_account(bob(), AccountType::Checking, "67890")
            .await?;
        Ok(())
    }

    /// Open both accounts and fund them with 100.00 and 50.00
    pub async fn open_funded(service: &LedgerService) -> Result<()> {
        Self::open(service).await?;
        service.deposit("12345", 10000).await?;
        service.deposit("67890", 5000).await?;
        Ok(())
    }
}

/// Service over fresh in-memory stores
pub fn test_service() -> LedgerService {
    LedgerService::in_memory()
}

pub async fn balance(service: &LedgerService, account_number: &str) -> Result<i64> {
    Ok(service.get_account(account_number).await?.balance)
}

/// Transaction store that can be told to reject appends.
#[derive(Default)]
pub struct FlakyTransactionStore {
    pub inner: InMemoryTransactionStore,
    pub fail_appends: AtomicBool,
}

#[async_trait]
impl TransactionStore for FlakyTransactionStore {
    async fn save(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected append failure".into()));
        }
        self.inner.save(transaction).await
    }

    async fn save_all(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected append failure".into()));
        }
        self.inner.save_all(transactions).await
    }

    async fn find_all_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.inner.find_all_by_account(account_id).await
    }

    async fn find_all_by_account_and_time_range(
        &self,
        account_id: AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.inner
            .find_all_by_account_and_time_range(account_id, start, end)
            .await
    }

    async fn find_all_by_correlation(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.inner.find_all_by_correlation(correlation_id).await
    }
}

/// Account store that fails writes once a budget of successful writes is
/// spent, and can slow down lookups.
pub struct FlakyAccountStore {
    pub inner: InMemoryAccountStore,
    pub writes_left: AtomicUsize,
    pub lookup_delay: Option<Duration>,
}

impl FlakyAccountStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryAccountStore::new(),
            writes_left: AtomicUsize::new(usize::MAX),
            lookup_delay: None,
        }
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub fn allow_writes(&self, n: usize) {
        self.writes_left.store(n, Ordering::SeqCst);
    }

    fn take_write(&self) -> Result<(), StoreError> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| StoreError::Unavailable("injected write failure".into()))
    }
}

#[async_trait]
impl AccountStore for FlakyAccountStore {
    async fn save(&self, account: Account) -> Result<Account, StoreError> {
        self.take_write()?;
        self.inner.save(account).await
    }

    async fn save_all(&self, accounts: Vec<Account>) -> Result<Vec<Account>, StoreError> {
        self.take_write()?;
        self.inner.save_all(accounts).await
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.find_by_account_number(account_number).await
    }

    async fn find_all_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Account>, StoreError> {
        self.inner.find_all_by_owner(owner_id).await
    }

    async fn find_all(&self) -> Result<Vec<Account>, StoreError> {
        self.inner.find_all().await
    }
}

/// Service wired to flaky stores, returning handles to both stores
pub fn flaky_service(
    accounts: FlakyAccountStore,
) -> (LedgerService, Arc<FlakyAccountStore>, Arc<FlakyTransactionStore>) {
    let accounts = Arc::new(accounts);
    let transactions = Arc::new(FlakyTransactionStore::default());
    let service = LedgerService::new(
        accounts.clone(),
        transactions.clone(),
        LedgerConfig::default().with_store_timeout(Duration::from_millis(50)),
    );
    (service, accounts, transactions)
}
