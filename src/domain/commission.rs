use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BasisPoints, BrokerId, Cents, LedgerError};

pub type CommissionId = Uuid;

/// Which balance bucket a commission is credited to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    /// Sale not yet settled; counts towards the pending balance
    #[serde(alias = "pendente")]
    Pending,
    /// Settled; counts towards the withdrawable balance
    #[serde(alias = "disponivel")]
    Available,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Available => "available",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" | "pendente" => Some(CommissionStatus::Pending),
            "available" | "disponivel" => Some(CommissionStatus::Available),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Commission earned on a single sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    pub id: CommissionId,
    pub broker_id: BrokerId,
    pub sale_amount_cents: Cents,
    pub percentage_bps: BasisPoints,
    pub commission_cents: Cents,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

impl Commission {
    /// Create a commission, computing its amount from the sale and percentage.
    /// Fails when the amount does not fit in [`Cents`].
    pub fn new(
        broker_id: BrokerId,
        sale_amount_cents: Cents,
        percentage_bps: BasisPoints,
        status: CommissionStatus,
    ) -> Result<Self, LedgerError> {
        let commission_cents = compute_commission(sale_amount_cents, percentage_bps)
            .ok_or(LedgerError::AmountOverflow)?;

        Ok(Self {
            id: Uuid::new_v4(),
            broker_id,
            sale_amount_cents,
            percentage_bps,
            commission_cents,
            status,
            created_at: Utc::now(),
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == CommissionStatus::Pending
    }
}

/// `sale * percentage / 100`, with the percentage in basis points, rounded
/// half up to the cent. `None` if the result does not fit in [`Cents`].
pub fn compute_commission(sale_amount_cents: Cents, percentage_bps: BasisPoints) -> Option<Cents> {
    let product = i128::from(sale_amount_cents) * i128::from(percentage_bps);
    let rounded = (product + 5_000).div_euclid(10_000);
    Cents::try_from(rounded).ok()
}
