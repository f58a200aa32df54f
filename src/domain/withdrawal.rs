use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BrokerId, Cents};

pub type WithdrawalId = Uuid;

/// Lifecycle of a payout request: pending -> approved -> paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    #[serde(alias = "pendente")]
    Pending,
    #[serde(alias = "aprovado")]
    Approved,
    #[serde(alias = "pago")]
    Paid,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" | "pendente" => Some(WithdrawalStatus::Pending),
            "approved" | "aprovado" => Some(WithdrawalStatus::Approved),
            "paid" | "pago" => Some(WithdrawalStatus::Paid),
            _ => None,
        }
    }

    /// Only single forward steps are allowed.
    pub fn can_advance_to(&self, next: WithdrawalStatus) -> bool {
        matches!(
            (self, next),
            (WithdrawalStatus::Pending, WithdrawalStatus::Approved)
                | (WithdrawalStatus::Approved, WithdrawalStatus::Paid)
        )
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A debit request against a broker's available balance.
/// The balance is debited when the withdrawal is created, not when it is paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub broker_id: BrokerId,
    pub amount_cents: Cents,
    /// PIX key the payout goes to
    pub destination_key: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn new(broker_id: BrokerId, amount_cents: Cents, destination_key: impl Into<String>) -> Self {
        assert!(amount_cents > 0, "Withdrawal amount must be positive");
        Self {
            id: Uuid::new_v4(),
            broker_id,
            amount_cents,
            destination_key: destination_key.into(),
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
        }
    }
}
