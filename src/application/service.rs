use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    build_integrity_report, format_cents, Account, AccountId, AccountType, Cents, CorrelationId,
    IntegrityReport, Owner, OwnerId, Transaction,
};
use crate::storage::{
    AccountStore, InMemoryAccountStore, InMemoryTransactionStore, StoreError, TransactionStore,
};

use super::locks::AccountLocks;
use super::{AppError, LedgerConfig};

/// Application service for deposits, withdrawals and transfers.
///
/// Cloning is cheap and every clone shares the same stores and locks, so one
/// service can be handed to any number of concurrent callers.
///
/// Each mutation locks the accounts it touches (ascending id), re-reads them
/// under the lock, validates, and then commits account writes and ledger
/// appends while holding the commit gate for writing. Reads through the
/// service hold the gate for reading, so they never observe balances without
/// their ledger entries.
#[derive(Clone)]
pub struct LedgerService {
    accounts: Arc<dyn AccountStore>,
    transactions: Arc<dyn TransactionStore>,
    locks: Arc<AccountLocks>,
    /// Held for writing while a commit runs. Carries the timestamp of the
    /// latest commit so ledger time never goes backwards.
    commit_gate: Arc<RwLock<DateTime<Utc>>>,
    config: LedgerConfig,
}

impl LedgerService {
    /// Create a ledger service over the given stores.
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transactions: Arc<dyn TransactionStore>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            accounts,
            transactions,
            locks: Arc::new(AccountLocks::default()),
            commit_gate: Arc::new(RwLock::new(DateTime::<Utc>::MIN_UTC)),
            config,
        }
    }

    /// A service over fresh in-memory stores with default settings.
    pub fn in_memory() -> Self {
        Self::in_memory_with_config(LedgerConfig::default())
    }

    pub fn in_memory_with_config(config: LedgerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryTransactionStore::new()),
            config,
        )
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ========================
    // Account operations
    // ========================

    /// Open a new account with a zero balance. The owner comes from the
    /// identity provider and is trusted as given.
    #[instrument(skip(self, owner), fields(owner_id = owner.id), err)]
    pub async fn create_account(
        &self,
        owner: Owner,
        account_type: AccountType,
        account_number: &str,
    ) -> Result<Account, AppError> {
        let account = Account::new(owner, account_type, account_number);

        let _gate = self.commit_gate.write().await;
        let account = self
            .bounded("save account", self.accounts.save(account))
            .await?;

        info!(account_id = account.id, account_type = %account_type, "account opened");
        Ok(account)
    }

    /// Get an account by its account number.
    pub async fn get_account(&self, account_number: &str) -> Result<Account, AppError> {
        let _gate = self.commit_gate.read().await;
        self.resolve(account_number).await
    }

    /// Accounts held by an owner, ascending id. Unknown owners have none.
    pub async fn get_accounts_for_owner(
        &self,
        owner_id: OwnerId,
    ) -> Result<Vec<Account>, AppError> {
        let _gate = self.commit_gate.read().await;
        self.bounded(
            "find accounts by owner",
            self.accounts.find_all_by_owner(owner_id),
        )
        .await
    }

    /// All accounts, ascending id.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        let _gate = self.commit_gate.read().await;
        self.bounded("list accounts", self.accounts.find_all()).await
    }

    // ========================
    // Ledger reads
    // ========================

    /// An account's ledger, newest first.
    pub async fn get_transactions_for_account(
        &self,
        account_number: &str,
    ) -> Result<Vec<Transaction>, AppError> {
        let _gate = self.commit_gate.read().await;
        let account = self.resolve(account_number).await?;
        let id = Self::id_of(&account)?;

        self.bounded(
            "find transactions",
            self.transactions.find_all_by_account(id),
        )
        .await
    }

    /// An account's ledger between `start` and `end` inclusive, newest first.
    pub async fn get_transactions_in_range(
        &self,
        account_number: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, AppError> {
        if start > end {
            return Err(AppError::InvalidArgument(format!(
                "range start {} is after end {}",
                start, end
            )));
        }

        let _gate = self.commit_gate.read().await;
        let account = self.resolve(account_number).await?;
        let id = Self::id_of(&account)?;

        self.bounded(
            "find transactions in range",
            self.transactions
                .find_all_by_account_and_time_range(id, start, end),
        )
        .await
    }

    /// Both legs of a transfer, in the order they were appended.
    pub async fn get_transfer_legs(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Vec<Transaction>, AppError> {
        let _gate = self.commit_gate.read().await;
        self.bounded(
            "find transfer legs",
            self.transactions.find_all_by_correlation(correlation_id),
        )
        .await
    }

    // ========================
    // Balance-changing operations
    // ========================

    /// Credit `amount` cents to an account.
    #[instrument(skip(self), err)]
    pub async fn deposit(
        &self,
        account_number: &str,
        amount: Cents,
    ) -> Result<Transaction, AppError> {
        validate_amount(amount)?;
        let id = Self::id_of(&self.resolve(account_number).await?)?;

        let _held = self.locks.acquire(&[id]).await?;
        let account = self.reload(id, account_number).await?;
        let new_balance = account.balance.checked_add(amount).ok_or_else(|| {
            AppError::InvalidAmount("deposit would overflow the balance".to_string())
        })?;
        let credited = account.clone().with_balance(new_balance);

        let mut gate = self.commit_gate.write().await;
        let entry = Transaction::deposit(id, amount, "Deposit", next_timestamp(&mut gate));
        let [entry] = self.commit_entries(vec![account], vec![credited], [entry]).await?;

        info!(
            account_id = id,
            amount = %format_cents(amount),
            balance = %format_cents(new_balance),
            "deposit committed"
        );
        Ok(entry)
    }

    /// Debit `amount` cents from an account that can cover it.
    #[instrument(skip(self), err)]
    pub async fn withdraw(
        &self,
        account_number: &str,
        amount: Cents,
    ) -> Result<Transaction, AppError> {
        validate_amount(amount)?;
        let id = Self::id_of(&self.resolve(account_number).await?)?;

        let _held = self.locks.acquire(&[id]).await?;
        let account = self.reload(id, account_number).await?;
        ensure_funds(&account, amount)?;
        let debited = account.clone().with_balance(account.balance - amount);
        let new_balance = debited.balance;

        let mut gate = self.commit_gate.write().await;
        let entry = Transaction::withdrawal(id, amount, "Withdrawal", next_timestamp(&mut gate));
        let [entry] = self.commit_entries(vec![account], vec![debited], [entry]).await?;

        info!(
            account_id = id,
            amount = %format_cents(amount),
            balance = %format_cents(new_balance),
            "withdrawal committed"
        );
        Ok(entry)
    }

    /// Move `amount` cents between two accounts.
    ///
    /// Returns `[withdrawal, deposit]`, sharing one correlation id. Both
    /// balances and both ledger entries are committed together or not at all.
    #[instrument(skip(self), err)]
    pub async fn transfer(
        &self,
        from_number: &str,
        to_number: &str,
        amount: Cents,
    ) -> Result<[Transaction; 2], AppError> {
        validate_amount(amount)?;
        let from_id = Self::id_of(&self.resolve(from_number).await?)?;
        let to_id = Self::id_of(&self.resolve(to_number).await?)?;
        if from_id == to_id {
            return Err(AppError::InvalidArgument(format!(
                "cannot transfer from account {} to itself",
                from_number
            )));
        }

        let _held = self.locks.acquire(&[from_id, to_id]).await?;
        let from = self.reload(from_id, from_number).await?;
        let to = self.reload(to_id, to_number).await?;
        ensure_funds(&from, amount)?;

        // both balances are computed before anything is written
        let debited = from.clone().with_balance(from.balance - amount);
        let credited_balance = to.balance.checked_add(amount).ok_or_else(|| {
            AppError::InvalidAmount("transfer would overflow the recipient balance".to_string())
        })?;
        let credited = to.clone().with_balance(credited_balance);

        let mut gate = self.commit_gate.write().await;
        let correlation_id = Uuid::new_v4();
        let now = next_timestamp(&mut gate);
        let legs = [
            Transaction::withdrawal(
                from_id,
                amount,
                format!("Transfer to {}", to.owner.display_name),
                now,
            )
            .with_correlation_id(correlation_id),
            Transaction::deposit(
                to_id,
                amount,
                format!("Transfer from {}", from.owner.display_name),
                now,
            )
            .with_correlation_id(correlation_id),
        ];
        let legs = self
            .commit_entries(vec![from, to], vec![debited, credited], legs)
            .await?;

        info!(
            from_account_id = from_id,
            to_account_id = to_id,
            amount = %format_cents(amount),
            %correlation_id,
            "transfer committed"
        );
        Ok(legs)
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check every account against its ledger.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let _gate = self.commit_gate.read().await;
        let accounts = self.bounded("list accounts", self.accounts.find_all()).await?;

        let mut ledgers: HashMap<AccountId, Vec<Transaction>> = HashMap::new();
        for account in &accounts {
            let id = Self::id_of(account)?;
            let entries = self
                .bounded(
                    "find transactions",
                    self.transactions.find_all_by_account(id),
                )
                .await?;
            ledgers.insert(id, entries);
        }

        Ok(build_integrity_report(&accounts, &ledgers))
    }

    // ========================
    // Internals
    // ========================

    /// Run a store call under the configured timeout.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AppError::StoreUnavailable(format!(
                "{} timed out after {:?}",
                operation, self.config.store_timeout
            ))),
        }
    }

    async fn resolve(&self, account_number: &str) -> Result<Account, AppError> {
        self.bounded(
            "find account",
            self.accounts.find_by_account_number(account_number),
        )
        .await?
        .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))
    }

    /// Fresh copy of an account once its lock is held.
    async fn reload(&self, id: AccountId, account_number: &str) -> Result<Account, AppError> {
        self.bounded("find account", self.accounts.find_by_id(id))
            .await?
            .ok_or_else(|| AppError::AccountNotFound(account_number.to_string()))
    }

    fn id_of(account: &Account) -> Result<AccountId, AppError> {
        account.id.ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "account {} has not been saved",
                account.account_number
            ))
        })
    }

    /// Write the updated accounts, then append the ledger entries.
    ///
    /// Callers hold the account locks and the commit gate. If either step
    /// fails the `before` snapshots are written back, so the accounts end up
    /// exactly as they were.
    async fn commit_entries<const N: usize>(
        &self,
        before: Vec<Account>,
        after: Vec<Account>,
        entries: [Transaction; N],
    ) -> Result<[Transaction; N], AppError> {
        let outcome = match self
            .bounded("save accounts", self.accounts.save_all(after))
            .await
        {
            Ok(_) => {
                self.bounded(
                    "append ledger entries",
                    self.transactions.save_all(entries.into()),
                )
                .await
            }
            Err(err) => Err(err),
        };

        let saved = match outcome {
            Ok(saved) => saved,
            Err(err) => return Err(self.roll_back(before, err).await),
        };

        match <[Transaction; N]>::try_from(saved) {
            Ok(saved) => Ok(saved),
            Err(saved) => Err(AppError::StoreUnavailable(format!(
                "ledger returned {} entries for {} appended",
                saved.len(),
                N
            ))),
        }
    }

    /// Restore account snapshots after a failed commit and pick the error to report.
    async fn roll_back(&self, snapshots: Vec<Account>, cause: AppError) -> AppError {
        let numbers: Vec<String> = snapshots
            .iter()
            .map(|a| a.account_number.clone())
            .collect();

        match self
            .bounded("restore accounts", self.accounts.save_all(snapshots))
            .await
        {
            Ok(_) => {
                warn!(accounts = ?numbers, error = %cause, "commit failed, balances restored");
                cause
            }
            Err(rollback_err) => {
                error!(
                    accounts = ?numbers,
                    error = %cause,
                    rollback_error = %rollback_err,
                    "commit failed and balances could not be restored"
                );
                AppError::StoreUnavailable(format!(
                    "{}; rollback failed: {}",
                    cause, rollback_err
                ))
            }
        }
    }
}

/// Wall-clock time, clamped so it never precedes the previous commit.
fn next_timestamp(last_commit: &mut DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now().max(*last_commit);
    *last_commit = now;
    now
}

fn validate_amount(amount: Cents) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::InvalidAmount(format!(
            "amount must be greater than zero, got {}",
            format_cents(amount)
        )));
    }
    Ok(())
}

fn ensure_funds(account: &Account, amount: Cents) -> Result<(), AppError> {
    if !account.can_cover(amount) {
        warn!(
            account_id = account.id,
            balance = %format_cents(account.balance),
            required = %format_cents(amount),
            "insufficient funds"
        );
        return Err(AppError::InsufficientFunds {
            account_number: account.account_number.clone(),
            balance: account.balance,
            required: amount,
        });
    }
    Ok(())
}
