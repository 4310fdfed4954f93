use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, Owner};

/// Surrogate key assigned by the account store. Never reused.
pub type AccountId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "checking" => Some(AccountType::Checking),
            "savings" => Some(AccountType::Savings),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// `None` until the account store assigns one on first save
    pub id: Option<AccountId>,
    /// Externally visible, unique and immutable once stored
    pub account_number: String,
    pub account_type: AccountType,
    /// Current balance in cents, never negative after an operation completes
    pub balance: Cents,
    pub owner: Owner,
    pub opened_on: NaiveDate,
}

impl Account {
    /// A fresh, unsaved account with a zero balance opened today.
    pub fn new(owner: Owner, account_type: AccountType, account_number: impl Into<String>) -> Self {
        Self {
            id: None,
            account_number: account_number.into(),
            account_type,
            balance: 0,
            owner,
            opened_on: Utc::now().date_naive(),
        }
    }

    pub fn with_balance(mut self, balance: Cents) -> Self {
        self.balance = balance;
        self
    }

    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Owner {
        Owner::new(1, "Alice")
    }

    #[test]
    fn test_account_type_parsing() {
        assert_eq!(AccountType::from_str("CHECKING"), Some(AccountType::Checking));
        assert_eq!(AccountType::from_str(" savings "), Some(AccountType::Savings));
        assert_eq!(AccountType::from_str("brokerage"), None);
        assert_eq!(AccountType::Savings.to_string(), "savings");
    }

    #[test]
    fn test_new_account_starts_empty_and_unsaved() {
        let account = Account::new(alice(), AccountType::Checking, "12345");

        assert_eq!(account.balance, 0);
        assert_eq!(account.account_number, "12345");
        assert!(account.id.is_none());
        assert_eq!(account.opened_on, Utc::now().date_naive());
    }

    #[test]
    fn test_can_cover() {
        let account = Account::new(alice(), AccountType::Savings, "1").with_balance(10000);

        assert!(account.can_cover(10000));
        assert!(!account.can_cover(10001));
    }
}
