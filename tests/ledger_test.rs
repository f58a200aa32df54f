mod common;

use anyhow::Result;
use common::{test_service, Fixtures, TEST_PASSWORD};
use corretora::application::AppError;
use corretora::domain::{CommissionStatus, WithdrawalStatus};
use uuid::Uuid;

#[tokio::test]
async fn test_commission_credits_pending_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::broker_with_payout(&service, "ana@example.com").await?;

    // 1000.00 at 5%
    let commission = service
        .record_commission(broker.id, 100_000, 500, CommissionStatus::Pending)
        .await?;
    assert_eq!(commission.commission_cents, 5_000);

    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.pending_balance_cents, 5_000);
    assert_eq!(broker.available_balance_cents, 0);

    Ok(())
}

#[tokio::test]
async fn test_available_commission_credits_available_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::broker_with_payout(&service, "ana@example.com").await?;

    service
        .record_commission(broker.id, 100_000, 500, CommissionStatus::Available)
        .await?;

    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.available_balance_cents, 5_000);
    assert_eq!(broker.pending_balance_cents, 0);

    Ok(())
}

#[tokio::test]
async fn test_commission_for_unknown_broker() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .record_commission(Uuid::new_v4(), 100_000, 500, CommissionStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BrokerNotFound(_)));

    let report = service.check_integrity().await?;
    assert_eq!(report.commission_count, 0);

    Ok(())
}

#[tokio::test]
async fn test_commission_rejects_non_positive_amounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::broker_with_payout(&service, "ana@example.com").await?;

    let err = service
        .record_commission(broker.id, 0, 500, CommissionStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = service
        .record_commission(broker.id, 100_000, 0, CommissionStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    Ok(())
}

#[tokio::test]
async fn test_release_moves_pending_to_available() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::broker_with_payout(&service, "ana@example.com").await?;

    let commission = service
        .record_commission(broker.id, 200_000, 250, CommissionStatus::Pending)
        .await?;
    let released = service.release_commission(commission.id).await?;
    assert_eq!(released.status, CommissionStatus::Available);

    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.pending_balance_cents, 0);
    assert_eq!(broker.available_balance_cents, 5_000);

    // Releasing twice is an invalid transition and changes nothing
    let err = service.release_commission(commission.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition { .. }));
    let after = service.get_broker(broker.id).await?;
    assert_eq!(after.available_balance_cents, 5_000);

    assert!(service.check_integrity().await?.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_withdrawal_debits_available_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", 10_000).await?;

    let withdrawal = service
        .request_withdrawal(broker.id, 4_000, TEST_PASSWORD)
        .await?;
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(withdrawal.destination_key, "ana@example.com");

    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.available_balance_cents, 6_000);

    Ok(())
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", 10_000).await?;

    let err = service
        .request_withdrawal(broker.id, 10_001, TEST_PASSWORD)
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientFunds {
            available,
            requested,
        } => {
            assert_eq!(available, 10_000);
            assert_eq!(requested, 10_001);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }

    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.available_balance_cents, 10_000);
    assert!(service.list_withdrawals(Some(broker.id)).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_withdrawal_of_entire_balance() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", 7_500).await?;

    service
        .request_withdrawal(broker.id, 7_500, TEST_PASSWORD)
        .await?;
    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.available_balance_cents, 0);

    let err = service
        .request_withdrawal(broker.id, 1, TEST_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));

    Ok(())
}

#[tokio::test]
async fn test_withdrawal_requires_correct_password() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", 10_000).await?;

    let err = service
        .request_withdrawal(broker.id, 1_000, "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.available_balance_cents, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_withdrawal_requires_bank_details() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let mut form = common::signup_form("Bruno", "bruno@example.com");
    form.password = Some(TEST_PASSWORD.to_string());
    let broker = service.register_broker(form).await?;
    service
        .record_commission(broker.id, 10_000, 10_000, CommissionStatus::Available)
        .await?;

    let err = service
        .request_withdrawal(broker.id, 1_000, TEST_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_withdrawal_rejects_non_positive_amount() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", 10_000).await?;

    for amount in [0, -500] {
        let err = service
            .request_withdrawal(broker.id, amount, TEST_PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidAmount(_)));
    }

    Ok(())
}

#[tokio::test]
async fn test_withdrawal_for_unknown_broker() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .request_withdrawal(Uuid::new_v4(), 1_000, TEST_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BrokerNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_withdrawal_advancement_leaves_balances_alone() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", 10_000).await?;
    let withdrawal = service
        .request_withdrawal(broker.id, 2_500, TEST_PASSWORD)
        .await?;

    // Paying before approval is not allowed
    let err = service
        .advance_withdrawal(withdrawal.id, WithdrawalStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStatusTransition { .. }));

    let approved = service
        .advance_withdrawal(withdrawal.id, WithdrawalStatus::Approved)
        .await?;
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    let paid = service
        .advance_withdrawal(withdrawal.id, WithdrawalStatus::Paid)
        .await?;
    assert_eq!(paid.status, WithdrawalStatus::Paid);

    let broker = service.get_broker(broker.id).await?;
    assert_eq!(broker.available_balance_cents, 7_500);

    let stored = service.list_withdrawals(Some(broker.id)).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, WithdrawalStatus::Paid);

    Ok(())
}

#[tokio::test]
async fn test_advance_unknown_withdrawal() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .advance_withdrawal(Uuid::new_v4(), WithdrawalStatus::Approved)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WithdrawalNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_balance_never_negative_over_mixed_sequence() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::broker_with_payout(&service, "ana@example.com").await?;

    let steps: [(i64, bool); 8] = [
        (3_000, true),
        (5_000, false),
        (2_000, false),
        (1_000, true),
        (4_000, false),
        (10_000, true),
        (9_000, false),
        (6_000, false),
    ];

    for (amount, is_credit) in steps {
        if is_credit {
            service
                .record_commission(broker.id, amount, 10_000, CommissionStatus::Available)
                .await?;
        } else {
            // Failures are expected for over-limit requests
            let _ = service
                .request_withdrawal(broker.id, amount, TEST_PASSWORD)
                .await;
        }

        let current = service.get_broker(broker.id).await?;
        assert!(current.available_balance_cents >= 0);
    }

    let report = service.check_integrity().await?;
    assert!(report.is_ok(), "integrity report: {:?}", report);

    let statement = service.broker_statement(broker.id).await?;
    assert!(statement.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_statement_matches_records() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", 10_000).await?;
    service
        .record_commission(broker.id, 50_000, 300, CommissionStatus::Pending)
        .await?;
    service
        .request_withdrawal(broker.id, 3_000, TEST_PASSWORD)
        .await?;

    let statement = service.broker_statement(broker.id).await?;
    assert_eq!(statement.commissions.len(), 2);
    assert_eq!(statement.withdrawals.len(), 1);
    assert_eq!(statement.expected.available, 7_000);
    assert_eq!(statement.expected.pending, 1_500);
    assert!(statement.is_consistent());

    Ok(())
}

#[tokio::test]
async fn test_list_commissions_for_unknown_broker_is_empty() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let commissions = service.list_commissions(Uuid::new_v4()).await?;
    assert!(commissions.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_commission_beyond_cents_range_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::broker_with_payout(&service, "ana@example.com").await?;

    let err = service
        .record_commission(broker.id, i64::MAX, 20_000, CommissionStatus::Available)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let err = service
        .record_commission(
            broker.id,
            6_148_914_691_236_517_206,
            30_000,
            CommissionStatus::Pending,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    assert!(service.list_commissions(broker.id).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_credit_overflowing_balance_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let broker = Fixtures::funded_broker(&service, "ana@example.com", i64::MAX).await?;
    assert_eq!(broker.available_balance_cents, i64::MAX);

    let err = service
        .record_commission(broker.id, 100, 10_000, CommissionStatus::Available)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    // A pending credit fits, but releasing it would overflow the available bucket
    let pending = service
        .record_commission(broker.id, 100, 10_000, CommissionStatus::Pending)
        .await?;
    let err = service.release_commission(pending.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));

    let stored = service.get_broker(broker.id).await?;
    assert_eq!(stored.available_balance_cents, i64::MAX);
    assert_eq!(stored.pending_balance_cents, 100);
    let commissions = service.list_commissions(broker.id).await?;
    assert_eq!(commissions.len(), 2);
    assert!(commissions
        .iter()
        .any(|c| c.id == pending.id && c.status == CommissionStatus::Pending));

    Ok(())
}
