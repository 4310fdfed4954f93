use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::{Account, AccountId, Cents, CorrelationId, Transaction, TransactionType};

/// Sum of the signed amounts of a set of ledger entries.
pub fn ledger_sum(transactions: &[Transaction]) -> Cents {
    transactions.iter().map(|t| t.amount).sum()
}

/// Replay ledger entries on top of an opening balance.
///
/// `transactions` is expected newest-first, the order the transaction store
/// returns them in. The result holds the balance after each entry, oldest first.
pub fn replay_balances(opening: Cents, transactions: &[Transaction]) -> Vec<Cents> {
    transactions
        .iter()
        .rev()
        .scan(opening, |balance, t| {
            *balance += t.amount;
            Some(*balance)
        })
        .collect()
}

/// Check that the entries sharing a correlation id form a well-formed transfer:
/// exactly one withdrawal and one deposit, inverse amounts, different accounts.
pub fn validate_transfer_pair(legs: &[Transaction]) -> Result<(), TransferPairError> {
    let [first, second] = legs else {
        return Err(TransferPairError::WrongLegCount(legs.len()));
    };

    let (debit, credit) = match (first.transaction_type, second.transaction_type) {
        (TransactionType::Withdrawal, TransactionType::Deposit) => (first, second),
        (TransactionType::Deposit, TransactionType::Withdrawal) => (second, first),
        _ => return Err(TransferPairError::MismatchedTypes),
    };

    if debit.amount + credit.amount != 0 {
        return Err(TransferPairError::AmountsDoNotCancel {
            debit: debit.amount,
            credit: credit.amount,
        });
    }
    if debit.account_id == credit.account_id {
        return Err(TransferPairError::SameAccount(debit.account_id));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPairError {
    WrongLegCount(usize),
    MismatchedTypes,
    AmountsDoNotCancel { debit: Cents, credit: Cents },
    SameAccount(AccountId),
}

impl std::fmt::Display for TransferPairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferPairError::WrongLegCount(n) => write!(f, "expected 2 legs, found {}", n),
            TransferPairError::MismatchedTypes => {
                write!(f, "legs are not one withdrawal and one deposit")
            }
            TransferPairError::AmountsDoNotCancel { debit, credit } => {
                write!(f, "debit {} and credit {} do not cancel out", debit, credit)
            }
            TransferPairError::SameAccount(id) => {
                write!(f, "both legs post to account #{}", id)
            }
        }
    }
}

impl std::error::Error for TransferPairError {}

/// Result of a ledger consistency check.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub transaction_count: usize,
    pub transfer_count: usize,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Cross-check accounts against their ledgers.
///
/// Accounts open at zero, so every balance must equal the sum of its entries
/// and no replayed balance may dip below zero.
pub fn build_integrity_report(
    accounts: &[Account],
    ledgers: &HashMap<AccountId, Vec<Transaction>>,
) -> IntegrityReport {
    let mut report = IntegrityReport {
        account_count: accounts.len(),
        ..Default::default()
    };
    let mut transfers: BTreeMap<CorrelationId, Vec<Transaction>> = BTreeMap::new();

    for account in accounts {
        let Some(id) = account.id else {
            report
                .issues
                .push(format!("account {} has no id", account.account_number));
            continue;
        };
        let entries = ledgers.get(&id).map(Vec::as_slice).unwrap_or_default();
        report.transaction_count += entries.len();

        if account.balance < 0 {
            report.issues.push(format!(
                "account {} has a negative balance ({})",
                account.account_number, account.balance
            ));
        }

        let sum = ledger_sum(entries);
        if sum != account.balance {
            report.issues.push(format!(
                "account {} balance {} differs from ledger sum {}",
                account.account_number, account.balance, sum
            ));
        }

        if replay_balances(0, entries).iter().any(|b| *b < 0) {
            report.issues.push(format!(
                "account {} ledger replays through a negative balance",
                account.account_number
            ));
        }

        for entry in entries {
            if !entry.transaction_type.accepts(entry.amount) {
                report.issues.push(format!(
                    "transaction #{} is a {} with amount {}",
                    entry.id.unwrap_or_default(),
                    entry.transaction_type,
                    entry.amount
                ));
            }
            if let Some(correlation_id) = entry.correlation_id {
                transfers
                    .entry(correlation_id)
                    .or_default()
                    .push(entry.clone());
            }
        }
    }

    report.transfer_count = transfers.len();
    for (correlation_id, legs) in &transfers {
        if let Err(e) = validate_transfer_pair(legs) {
            report
                .issues
                .push(format!("transfer {}: {}", correlation_id, e));
        }
    }

    report
}
