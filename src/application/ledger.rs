use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    build_integrity_report, check_withdrawal, expected_balances, format_cents, Balances, BasisPoints,
    Broker, BrokerId, Cents, Commission, CommissionId, CommissionStatus, IntegrityReport,
    LedgerError, Withdrawal, WithdrawalId, WithdrawalStatus,
};
use crate::storage::{BalanceWrite, CreditWrite};

use super::password::verify_password;
use super::{AppError, PortalService};

/// A broker together with its ledger records and the balances they imply.
#[derive(Debug, Serialize)]
pub struct BrokerStatement {
    pub broker: Broker,
    pub commissions: Vec<Commission>,
    pub withdrawals: Vec<Withdrawal>,
    pub expected: Balances,
}

impl BrokerStatement {
    pub fn is_consistent(&self) -> bool {
        Balances::of(&self.broker) == self.expected
    }
}

impl PortalService {
    /// Record a commission for a sale and credit it to the broker's
    /// pending or available balance.
    pub async fn record_commission(
        &self,
        broker_id: BrokerId,
        sale_amount_cents: Cents,
        percentage_bps: BasisPoints,
        status: CommissionStatus,
    ) -> Result<Commission, AppError> {
        if sale_amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Sale amount must be positive".to_string(),
            ));
        }
        if percentage_bps <= 0 {
            return Err(AppError::InvalidAmount(
                "Percentage must be positive".to_string(),
            ));
        }

        let commission = Commission::new(broker_id, sale_amount_cents, percentage_bps, status)?;
        match self.repo.save_commission(&commission).await? {
            CreditWrite::Applied => {}
            CreditWrite::BrokerNotFound | CreditWrite::NotPending => {
                return Err(AppError::BrokerNotFound(broker_id.to_string()));
            }
            CreditWrite::BalanceOverflow => return Err(LedgerError::AmountOverflow.into()),
        }

        info!(
            broker_id = %broker_id,
            commission_id = %commission.id,
            amount = %format_cents(commission.commission_cents),
            status = %commission.status,
            "recorded commission"
        );
        Ok(commission)
    }

    /// Move a pending commission into the available balance.
    pub async fn release_commission(&self, id: CommissionId) -> Result<Commission, AppError> {
        let mut commission = self
            .repo
            .get_commission(id)
            .await?
            .ok_or_else(|| AppError::CommissionNotFound(id.to_string()))?;

        let transition_error = || AppError::InvalidStatusTransition {
            from: commission.status.to_string(),
            to: CommissionStatus::Available.to_string(),
        };
        if !commission.is_pending() {
            return Err(transition_error());
        }
        match self.repo.release_commission(id).await? {
            CreditWrite::Applied => {}
            CreditWrite::NotPending => return Err(transition_error()),
            CreditWrite::BrokerNotFound => {
                return Err(AppError::BrokerNotFound(commission.broker_id.to_string()));
            }
            CreditWrite::BalanceOverflow => return Err(LedgerError::AmountOverflow.into()),
        }

        commission.status = CommissionStatus::Available;
        info!(commission_id = %id, "released commission");
        Ok(commission)
    }

    /// List a broker's commissions.
    pub async fn list_commissions(&self, broker_id: BrokerId) -> Result<Vec<Commission>, AppError> {
        Ok(self.repo.list_commissions(Some(broker_id)).await?)
    }

    /// Create a withdrawal and debit the available balance immediately.
    /// Fails without touching the balance when funds are insufficient.
    pub async fn create_withdrawal(
        &self,
        broker_id: BrokerId,
        amount_cents: Cents,
        destination_key: &str,
    ) -> Result<Withdrawal, AppError> {
        let broker = self.get_broker(broker_id).await?;
        if destination_key.trim().is_empty() {
            return Err(AppError::MissingField("destination_key"));
        }
        check_withdrawal(broker.available_balance_cents, amount_cents)?;

        let withdrawal = Withdrawal::new(broker_id, amount_cents, destination_key.trim());
        match self.repo.save_withdrawal(&withdrawal).await? {
            BalanceWrite::Applied => {
                info!(
                    broker_id = %broker_id,
                    withdrawal_id = %withdrawal.id,
                    amount = %format_cents(amount_cents),
                    "created withdrawal"
                );
                Ok(withdrawal)
            }
            BalanceWrite::BrokerNotFound => Err(AppError::BrokerNotFound(broker_id.to_string())),
            BalanceWrite::InsufficientFunds { available } => {
                warn!(
                    broker_id = %broker_id,
                    available = %format_cents(available),
                    requested = %format_cents(amount_cents),
                    "withdrawal rejected"
                );
                Err(AppError::InsufficientFunds {
                    available,
                    requested: amount_cents,
                })
            }
        }
    }

    /// Portal withdrawal flow: confirm the password, require bank details and
    /// pay out to the registered PIX key.
    pub async fn request_withdrawal(
        &self,
        broker_id: BrokerId,
        amount_cents: Cents,
        password: &str,
    ) -> Result<Withdrawal, AppError> {
        let broker = self.get_broker(broker_id).await?;

        if !verify_password(password, broker.password_hash.as_deref()) {
            warn!(broker_id = %broker_id, "withdrawal password rejected");
            return Err(AppError::InvalidCredentials);
        }

        let Some(bank_details) = broker.bank_details else {
            return Err(AppError::Validation(
                "Register bank details before requesting a withdrawal".to_string(),
            ));
        };

        self.create_withdrawal(broker_id, amount_cents, &bank_details.pix_key)
            .await
    }

    /// Advance a withdrawal one step (pending -> approved -> paid).
    /// Balances are not touched.
    pub async fn advance_withdrawal(
        &self,
        id: WithdrawalId,
        to: WithdrawalStatus,
    ) -> Result<Withdrawal, AppError> {
        let mut withdrawal = self
            .repo
            .get_withdrawal(id)
            .await?
            .ok_or_else(|| AppError::WithdrawalNotFound(id.to_string()))?;

        let from = withdrawal.status;
        let transition_error = || AppError::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        };
        if !from.can_advance_to(to) || !self.repo.update_withdrawal_status(id, from, to).await? {
            return Err(transition_error());
        }

        withdrawal.status = to;
        info!(withdrawal_id = %id, from = %from, to = %to, "advanced withdrawal");
        Ok(withdrawal)
    }

    /// List withdrawals, optionally for a single broker.
    pub async fn list_withdrawals(
        &self,
        broker_id: Option<BrokerId>,
    ) -> Result<Vec<Withdrawal>, AppError> {
        Ok(self.repo.list_withdrawals(broker_id).await?)
    }

    /// A broker's records and the balances they should add up to.
    pub async fn broker_statement(&self, broker_id: BrokerId) -> Result<BrokerStatement, AppError> {
        let broker = self.get_broker(broker_id).await?;
        let commissions = self.repo.list_commissions(Some(broker_id)).await?;
        let withdrawals = self.repo.list_withdrawals(Some(broker_id)).await?;
        let expected = expected_balances(broker_id, &commissions, &withdrawals);

        Ok(BrokerStatement {
            broker,
            commissions,
            withdrawals,
            expected,
        })
    }

    /// Check stored balances against the commission and withdrawal records.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let brokers = self.repo.list_brokers().await?;
        let commissions = self.repo.list_commissions(None).await?;
        let withdrawals = self.repo.list_withdrawals(None).await?;

        Ok(build_integrity_report(&brokers, &commissions, &withdrawals))
    }
}
