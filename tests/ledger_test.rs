mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{StandardAccounts, alice, balance, bob, test_service};
use tellerbook::domain::{AccountType, Owner, TransactionType, ledger_sum, replay_balances};
use tellerbook::AppError;

#[tokio::test]
async fn test_create_account_starts_at_zero() -> Result<()> {
    let service = test_service();

    let account = service
        .create_account(alice(), AccountType::Savings, "12345")
        .await?;

    assert_eq!(account.id, Some(1));
    assert_eq!(account.balance, 0);
    assert_eq!(account.account_type, AccountType::Savings);
    assert_eq!(account.opened_on, Utc::now().date_naive());
    assert_eq!(service.get_account("12345").await?, account);
    assert!(service.get_transactions_for_account("12345").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_duplicate_account_number_is_rejected() -> Result<()> {
    let service = test_service();
    service
        .create_account(alice(), AccountType::Checking, "12345")
        .await?;

    let result = service
        .create_account(bob(), AccountType::Savings, "12345")
        .await;

    assert_eq!(
        result,
        Err(AppError::DuplicateAccountNumber("12345".to_string()))
    );
    assert_eq!(service.get_account("12345").await?.owner, alice());

    Ok(())
}

#[tokio::test]
async fn test_empty_account_number_is_invalid() {
    let service = test_service();

    let result = service
        .create_account(alice(), AccountType::Checking, "")
        .await;

    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_deposit_credits_account() -> Result<()> {
    let service = test_service();
    StandardAccounts::open(&service).await?;

    let tx = service.deposit("12345", 2550).await?;

    assert_eq!(tx.amount, 2550);
    assert_eq!(tx.transaction_type, TransactionType::Deposit);
    assert_eq!(tx.description, "Deposit");
    assert!(tx.id.is_some());
    assert!(tx.correlation_id.is_none());
    assert_eq!(balance(&service, "12345").await?, 2550);

    Ok(())
}

#[tokio::test]
async fn test_withdraw_debits_account() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    let tx = service.withdraw("12345", 3000).await?;

    assert_eq!(tx.amount, -3000);
    assert_eq!(tx.transaction_type, TransactionType::Withdrawal);
    assert_eq!(tx.description, "Withdrawal");
    assert_eq!(balance(&service, "12345").await?, 7000);

    Ok(())
}

#[tokio::test]
async fn test_withdraw_more_than_balance_fails() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    let result = service.withdraw("12345", 15000).await;

    assert_eq!(
        result,
        Err(AppError::InsufficientFunds {
            account_number: "12345".to_string(),
            balance: 10000,
            required: 15000,
        })
    );
    assert_eq!(balance(&service, "12345").await?, 10000);
    // only the funding deposit
    assert_eq!(service.get_transactions_for_account("12345").await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_withdraw_entire_balance() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    service.withdraw("67890", 5000).await?;

    assert_eq!(balance(&service, "67890").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_are_rejected() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    assert!(matches!(
        service.deposit("12345", -500).await,
        Err(AppError::InvalidAmount(_))
    ));
    assert!(matches!(
        service.deposit("12345", 0).await,
        Err(AppError::InvalidAmount(_))
    ));
    assert!(matches!(
        service.withdraw("12345", -1).await,
        Err(AppError::InvalidAmount(_))
    ));
    assert!(matches!(
        service.transfer("12345", "67890", 0).await,
        Err(AppError::InvalidAmount(_))
    ));

    assert_eq!(balance(&service, "12345").await?, 10000);
    assert_eq!(balance(&service, "67890").await?, 5000);
    assert_eq!(service.get_transactions_for_account("12345").await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_amount_is_validated_before_account_lookup() {
    let service = test_service();

    let result = service.deposit("does-not-exist", -500).await;

    assert!(matches!(result, Err(AppError::InvalidAmount(_))));
}

#[tokio::test]
async fn test_unknown_account_is_not_found() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    assert_eq!(
        service.get_account("does-not-exist").await,
        Err(AppError::AccountNotFound("does-not-exist".to_string()))
    );
    assert!(matches!(
        service.get_transactions_for_account("does-not-exist").await,
        Err(AppError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.deposit("does-not-exist", 100).await,
        Err(AppError::AccountNotFound(_))
    ));
    assert!(matches!(
        service.transfer("12345", "does-not-exist", 100).await,
        Err(AppError::AccountNotFound(_))
    ));
    assert_eq!(balance(&service, "12345").await?, 10000);

    Ok(())
}

#[tokio::test]
async fn test_transfer_moves_funds() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    let [withdrawal, deposit] = service.transfer("12345", "67890", 7500).await?;

    assert_eq!(withdrawal.amount, -7500);
    assert_eq!(deposit.amount, 7500);
    assert_eq!(withdrawal.transaction_type, TransactionType::Withdrawal);
    assert_eq!(deposit.transaction_type, TransactionType::Deposit);
    assert!(withdrawal.correlation_id.is_some());
    assert_eq!(withdrawal.correlation_id, deposit.correlation_id);
    assert_ne!(withdrawal.account_id, deposit.account_id);
    assert_eq!(withdrawal.description, "Transfer to Bob");
    assert_eq!(deposit.description, "Transfer from Alice");

    assert_eq!(balance(&service, "12345").await?, 2500);
    assert_eq!(balance(&service, "67890").await?, 12500);

    let legs = service
        .get_transfer_legs(withdrawal.correlation_id.unwrap())
        .await?;
    assert_eq!(legs, vec![withdrawal, deposit]);

    Ok(())
}

#[tokio::test]
async fn test_transfer_conserves_money() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    let before = balance(&service, "12345").await? + balance(&service, "67890").await?;
    service.transfer("67890", "12345", 1234).await?;
    service.transfer("12345", "67890", 9999).await?;
    let after = balance(&service, "12345").await? + balance(&service, "67890").await?;

    assert_eq!(before, after);
    assert_eq!(balance(&service, "12345").await?, 10000 + 1234 - 9999);

    Ok(())
}

#[tokio::test]
async fn test_balance_overflow_is_invalid_amount() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;
    service.withdraw("12345", 10000).await?;
    service.deposit("12345", i64::MAX).await?;

    assert!(matches!(
        service.deposit("12345", 1).await,
        Err(AppError::InvalidAmount(_))
    ));
    assert!(matches!(
        service.transfer("67890", "12345", 5).await,
        Err(AppError::InvalidAmount(_))
    ));

    assert_eq!(balance(&service, "12345").await?, i64::MAX);
    assert_eq!(balance(&service, "67890").await?, 5000);
    // funding deposit, withdrawal and the large deposit
    assert_eq!(service.get_transactions_for_account("12345").await?.len(), 3);
    assert_eq!(service.get_transactions_for_account("67890").await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_transfer_with_insufficient_funds_moves_nothing() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    let result = service.transfer("12345", "67890", 10001).await;

    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));
    assert_eq!(balance(&service, "12345").await?, 10000);
    assert_eq!(balance(&service, "67890").await?, 5000);
    assert_eq!(service.get_transactions_for_account("12345").await?.len(), 1);
    assert_eq!(service.get_transactions_for_account("67890").await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_transfer_to_same_account_is_rejected() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;

    let result = service.transfer("12345", "12345", 100).await;

    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    assert_eq!(balance(&service, "12345").await?, 10000);

    Ok(())
}

#[tokio::test]
async fn test_ledger_is_complete_and_newest_first() -> Result<()> {
    let service = test_service();
    StandardAccounts::open(&service).await?;

    service.deposit("12345", 10000).await?;
    service.withdraw("12345", 2500).await?;
    service.deposit("12345", 300).await?;
    service.withdraw("12345", 800).await?;

    let ledger = service.get_transactions_for_account("12345").await?;
    let amounts: Vec<i64> = ledger.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![-800, 300, -2500, 10000]);

    let account = service.get_account("12345").await?;
    assert_eq!(ledger_sum(&ledger), account.balance);
    assert_eq!(
        replay_balances(0, &ledger),
        vec![10000, 7500, 7800, 7000]
    );

    Ok(())
}

#[tokio::test]
async fn test_transactions_in_range() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;
    service.withdraw("12345", 100).await?;

    let now = Utc::now();
    let all = service
        .get_transactions_in_range("12345", now - Duration::hours(1), now)
        .await?;
    assert_eq!(all.len(), 2);

    let future = service
        .get_transactions_in_range("12345", now + Duration::hours(1), now + Duration::hours(2))
        .await?;
    assert!(future.is_empty());

    let reversed = service
        .get_transactions_in_range("12345", now, now - Duration::hours(1))
        .await;
    assert!(matches!(reversed, Err(AppError::InvalidArgument(_))));

    Ok(())
}

#[tokio::test]
async fn test_accounts_for_owner() -> Result<()> {
    let service = test_service();
    StandardAccounts::open(&service).await?;
    service
        .create_account(alice(), AccountType::Savings, "12345-S")
        .await?;

    let numbers: Vec<String> = service
        .get_accounts_for_owner(alice().id)
        .await?
        .into_iter()
        .map(|a| a.account_number)
        .collect();

    assert_eq!(numbers, vec!["12345", "12345-S"]);
    assert!(
        service
            .get_accounts_for_owner(Owner::new(99, "Nobody").id)
            .await?
            .is_empty()
    );

    Ok(())
}

#[tokio::test]
async fn test_integrity_after_mixed_operations() -> Result<()> {
    let service = test_service();
    StandardAccounts::open_funded(&service).await?;
    service.transfer("12345", "67890", 7500).await?;
    service.withdraw("67890", 2000).await?;

    let report = service.check_integrity().await?;

    assert!(report.is_healthy(), "{:?}", report.issues);
    assert_eq!(report.account_count, 2);
    assert_eq!(report.transaction_count, 5);
    assert_eq!(report.transfer_count, 1);

    Ok(())
}
