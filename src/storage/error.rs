use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid store input: {0}")]
    InvalidArgument(String),

    #[error("Account number already in use: {0}")]
    DuplicateAccountNumber(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn poisoned(store: &str) -> Self {
        StoreError::Unavailable(format!("{} lock poisoned", store))
    }
}
