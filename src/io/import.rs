use anyhow::Result;
use serde::Deserialize;
use std::io::Read;

use crate::application::LedgerService;
use crate::domain::{parse_cents, AccountType, Cents, Owner, OwnerId};

/// One row of a batch file.
///
/// Header: `op,account,counterparty,amount,owner_id,owner_name,kind`.
/// Columns an operation does not use are left empty.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationRecord {
    pub op: String,
    pub account: String,
    pub counterparty: Option<String>,
    pub amount: Option<String>,
    pub owner_id: Option<OwnerId>,
    pub owner_name: Option<String>,
    pub kind: Option<String>,
}

/// A parsed ledger operation, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Open {
        owner: Owner,
        account_type: AccountType,
        account_number: String,
    },
    Deposit {
        account_number: String,
        amount: Cents,
    },
    Withdraw {
        account_number: String,
        amount: Cents,
    },
    Transfer {
        from: String,
        to: String,
        amount: Cents,
    },
}

impl OperationRecord {
    pub fn parse(self) -> Result<Operation, String> {
        match self.op.trim().to_lowercase().as_str() {
            "open" => {
                let owner_id = self.owner_id.ok_or("open requires owner_id")?;
                let owner_name = self.owner_name.unwrap_or_default();
                let kind = self.kind.as_deref().unwrap_or("checking");
                let account_type = AccountType::from_str(kind)
                    .ok_or_else(|| format!("Unknown account kind: {}", kind))?;
                Ok(Operation::Open {
                    owner: Owner::new(owner_id, owner_name),
                    account_type,
                    account_number: self.account,
                })
            }
            "deposit" => Ok(Operation::Deposit {
                amount: parse_amount(self.amount.as_deref())?,
                account_number: self.account,
            }),
            "withdraw" => Ok(Operation::Withdraw {
                amount: parse_amount(self.amount.as_deref())?,
                account_number: self.account,
            }),
            "transfer" => Ok(Operation::Transfer {
                amount: parse_amount(self.amount.as_deref())?,
                to: self.counterparty.ok_or("transfer requires counterparty")?,
                from: self.account,
            }),
            other => Err(format!("Unknown operation: {}", other)),
        }
    }
}

fn parse_amount(amount: Option<&str>) -> Result<Cents, String> {
    let amount = amount.ok_or("missing amount")?;
    parse_cents(amount).map_err(|e| format!("Invalid amount '{}': {}", amount, e))
}

/// Result of running a batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub applied: usize,
    pub errors: Vec<BatchError>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A row that could not be parsed or was rejected by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    pub line: usize,
    pub error: String,
}

/// Options for batch runs
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Parse and validate rows without touching the ledger
    pub dry_run: bool,
}

/// Parse every row of a batch file, collecting the ones that fail.
pub fn parse_operations_csv<R: Read>(reader: R) -> (Vec<(usize, Operation)>, Vec<BatchError>) {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut operations = Vec::new();
    let mut errors = Vec::new();

    for (line_num, result) in csv_reader.deserialize::<OperationRecord>().enumerate() {
        let line = line_num + 2; // +2 for header and 0-indexing

        let parsed = result
            .map_err(|e| format!("CSV parse error: {}", e))
            .and_then(OperationRecord::parse);
        match parsed {
            Ok(operation) => operations.push((line, operation)),
            Err(error) => errors.push(BatchError { line, error }),
        }
    }

    (operations, errors)
}

/// Applies batch files to a ledger, row by row
pub struct BatchRunner<'a> {
    service: &'a LedgerService,
}

impl<'a> BatchRunner<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Run a CSV batch. Rows are applied in file order; a rejected row is
    /// reported and the batch carries on.
    pub async fn run_csv<R: Read>(&self, reader: R, options: BatchOptions) -> Result<BatchReport> {
        let (operations, mut errors) = parse_operations_csv(reader);
        let mut applied = 0;

        for (line, operation) in operations {
            if options.dry_run {
                applied += 1;
                continue;
            }

            match self.apply(operation).await {
                Ok(()) => applied += 1,
                Err(e) => errors.push(BatchError {
                    line,
                    error: e.to_string(),
                }),
            }
        }

        errors.sort_by_key(|e| e.line);
        Ok(BatchReport { applied, errors })
    }

    async fn apply(&self, operation: Operation) -> Result<()> {
        match operation {
            Operation::Open {
                owner,
                account_type,
                account_number,
            } => {
                self.service
                    .create_account(owner, account_type, &account_number)
                    .await?;
            }
            Operation::Deposit {
                account_number,
                amount,
            } => {
                self.service.deposit(&account_number, amount).await?;
            }
            Operation::Withdraw {
                account_number,
                amount,
            } => {
                self.service.withdraw(&account_number, amount).await?;
            }
            Operation::Transfer { from, to, amount } => {
                self.service.transfer(&from, &to, amount).await?;
            }
        }
        Ok(())
    }
}
