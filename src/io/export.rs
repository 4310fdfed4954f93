use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{format_cents, Account, Transaction};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger state to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export accounts and balances to CSV format
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "account_number",
            "type",
            "owner_id",
            "owner",
            "balance",
            "opened_on",
        ])?;

        for account in &accounts {
            csv_writer.write_record([
                account.id.map(|id| id.to_string()).unwrap_or_default(),
                account.account_number.clone(),
                account.account_type.as_str().to_string(),
                account.owner.id.to_string(),
                account.owner.display_name.clone(),
                format_cents(account.balance),
                account.opened_on.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export every ledger entry to CSV format, grouped by account
    pub async fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "account_number",
            "type",
            "amount",
            "description",
            "timestamp",
            "correlation_id",
        ])?;

        let mut count = 0;
        for account in self.service.list_accounts().await? {
            let entries = self
                .service
                .get_transactions_for_account(&account.account_number)
                .await?;
            for entry in &entries {
                csv_writer.write_record([
                    entry.id.map(|id| id.to_string()).unwrap_or_default(),
                    account.account_number.clone(),
                    entry.transaction_type.as_str().to_string(),
                    format_cents(entry.amount),
                    entry.description.clone(),
                    entry.timestamp.to_rfc3339(),
                    entry
                        .correlation_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export accounts and ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let accounts = self.service.list_accounts().await?;
        let mut transactions = Vec::new();
        for account in &accounts {
            transactions.extend(
                self.service
                    .get_transactions_for_account(&account.account_number)
                    .await?,
            );
        }
        transactions.sort_by_key(|t| t.id);

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts,
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
