use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::AccountId;

use super::AppError;

/// One async mutex per account id, created on first use.
///
/// Holding an account's guard serialises every balance mutation on that
/// account. Multiple guards are always taken in ascending id order.
#[derive(Debug, Default)]
pub(crate) struct AccountLocks {
    table: Mutex<HashMap<AccountId, Arc<AsyncMutex<()>>>>,
}

/// Guards held for the duration of one ledger operation.
#[derive(Debug)]
pub(crate) struct HeldLocks {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AccountLocks {
    fn handle(&self, id: AccountId) -> Result<Arc<AsyncMutex<()>>, AppError> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| AppError::StoreUnavailable("account lock table poisoned".to_string()))?;
        Ok(table.entry(id).or_default().clone())
    }

    /// Lock every id in `ids`, ascending and de-duplicated.
    pub(crate) async fn acquire(&self, ids: &[AccountId]) -> Result<HeldLocks, AppError> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for id in ordered {
            let handle = self.handle(id)?;
            guards.push(handle.lock_owned().await);
            tracing::debug!(account_id = id, "account lock acquired");
        }
        Ok(HeldLocks { _guards: guards })
    }
}
