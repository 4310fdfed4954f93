use thiserror::Error;

use crate::domain::Cents;
use crate::storage::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No account found with number: {0}")]
    AccountNotFound(String),

    #[error("Insufficient funds in account {account_number}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_number: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Account number already in use: {0}")]
    DuplicateAccountNumber(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidArgument(msg) => AppError::InvalidArgument(msg),
            StoreError::DuplicateAccountNumber(number) => AppError::DuplicateAccountNumber(number),
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
        }
    }
}
