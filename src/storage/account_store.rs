use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{Account, AccountId, OwnerId};

use super::StoreError;

/// Keyed storage for accounts.
///
/// `save` inserts when the record has no id (assigning the next id) and
/// overwrites otherwise. Reads return copies; the store keeps the
/// authoritative record.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn save(&self, account: Account) -> Result<Account, StoreError>;

    /// Save several accounts as one unit: either every record is written or none is.
    async fn save_all(&self, accounts: Vec<Account>) -> Result<Vec<Account>, StoreError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Accounts held by `owner_id`, ascending id. Empty for an unknown owner.
    async fn find_all_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Account>, StoreError>;

    /// Every account, ascending id.
    async fn find_all(&self) -> Result<Vec<Account>, StoreError>;
}

#[derive(Debug, Default)]
struct AccountTables {
    last_id: AccountId,
    by_id: BTreeMap<AccountId, Account>,
    by_number: HashMap<String, AccountId>,
    by_owner: HashMap<OwnerId, BTreeSet<AccountId>>,
}

impl AccountTables {
    /// Validate a batch against the current tables without touching them.
    fn check(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let mut claimed: HashSet<&str> = HashSet::new();

        for account in accounts {
            if account.account_number.trim().is_empty() {
                return Err(StoreError::InvalidArgument(
                    "account number must not be empty".to_string(),
                ));
            }
            if account.balance < 0 {
                return Err(StoreError::InvalidArgument(format!(
                    "account {} cannot hold a negative balance",
                    account.account_number
                )));
            }

            match account.id {
                Some(id) => {
                    let existing = self.by_id.get(&id).ok_or_else(|| {
                        StoreError::InvalidArgument(format!("unknown account id {}", id))
                    })?;
                    if existing.account_number != account.account_number {
                        return Err(StoreError::InvalidArgument(format!(
                            "account number of #{} cannot change from {} to {}",
                            id, existing.account_number, account.account_number
                        )));
                    }
                }
                None => {
                    if self.by_number.contains_key(&account.account_number)
                        || !claimed.insert(account.account_number.as_str())
                    {
                        return Err(StoreError::DuplicateAccountNumber(
                            account.account_number.clone(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    fn apply(&mut self, mut account: Account) -> Account {
        let id = match account.id {
            Some(id) => {
                if let Some(previous) = self.by_id.get(&id) {
                    if previous.owner.id != account.owner.id {
                        if let Some(ids) = self.by_owner.get_mut(&previous.owner.id) {
                            ids.remove(&id);
                        }
                    }
                }
                id
            }
            None => {
                self.last_id += 1;
                account.id = Some(self.last_id);
                self.by_number
                    .insert(account.account_number.clone(), self.last_id);
                self.last_id
            }
        };

        self.by_owner.entry(account.owner.id).or_default().insert(id);
        self.by_id.insert(id, account.clone());
        account
    }
}

/// In-memory account store.
///
/// The primary map and both secondary indexes live behind one lock, so a
/// reader never sees a half-written account or an index pointing at a
/// different version of the record.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    tables: RwLock<AccountTables>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn save(&self, account: Account) -> Result<Account, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::poisoned("account store"))?;

        tables.check(std::slice::from_ref(&account))?;
        Ok(tables.apply(account))
    }

    async fn save_all(&self, accounts: Vec<Account>) -> Result<Vec<Account>, StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::poisoned("account store"))?;

        tables.check(&accounts)?;
        Ok(accounts.into_iter().map(|a| tables.apply(a)).collect())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::poisoned("account store"))?;

        Ok(tables.by_id.get(&id).cloned())
    }

    async fn find_by_account_number(
        &self,
        account_number: &str,
    ) -> Result<Option<Account>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::poisoned("account store"))?;

        Ok(tables
            .by_number
            .get(account_number)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn find_all_by_owner(&self, owner_id: OwnerId) -> Result<Vec<Account>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::poisoned("account store"))?;

        Ok(tables
            .by_owner
            .get(&owner_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.by_id.get(id))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Account>, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::poisoned("account store"))?;

        Ok(tables.by_id.values().cloned().collect())
    }
}
