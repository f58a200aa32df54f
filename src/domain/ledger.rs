use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::{Broker, BrokerId, Cents, Commission, CommissionStatus, Withdrawal};

/// The two balance buckets a broker holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub available: Cents,
    pub pending: Cents,
}

impl Balances {
    pub fn of(broker: &Broker) -> Self {
        Self {
            available: broker.available_balance_cents,
            pending: broker.pending_balance_cents,
        }
    }

    /// Credit a commission to the bucket matching its status, saturating at
    /// the `Cents` bounds.
    pub fn credit(&mut self, status: CommissionStatus, amount: Cents) {
        match status {
            CommissionStatus::Pending => self.pending = self.pending.saturating_add(amount),
            CommissionStatus::Available => self.available = self.available.saturating_add(amount),
        }
    }

    fn debit(&mut self, amount: Cents) {
        self.available = self.available.saturating_sub(amount);
    }
}

/// Validate a withdrawal against the available balance.
pub fn check_withdrawal(available: Cents, amount: Cents) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    if amount > available {
        return Err(LedgerError::InsufficientFunds {
            available,
            requested: amount,
        });
    }
    Ok(())
}

/// Rebuild a broker's balances from its commission and withdrawal records.
/// Available = available commissions - all withdrawals; pending = pending commissions.
pub fn expected_balances(
    broker_id: BrokerId,
    commissions: &[Commission],
    withdrawals: &[Withdrawal],
) -> Balances {
    let mut balances = Balances::default();
    for commission in commissions.iter().filter(|c| c.broker_id == broker_id) {
        balances.credit(commission.status, commission.commission_cents);
    }
    for withdrawal in withdrawals.iter().filter(|w| w.broker_id == broker_id) {
        balances.debit(withdrawal.amount_cents);
    }
    balances
}

/// Rebuild balances for every broker referenced by the records.
pub fn expected_all_balances(
    commissions: &[Commission],
    withdrawals: &[Withdrawal],
) -> HashMap<BrokerId, Balances> {
    let mut balances: HashMap<BrokerId, Balances> = HashMap::new();

    for commission in commissions {
        balances
            .entry(commission.broker_id)
            .or_default()
            .credit(commission.status, commission.commission_cents);
    }
    for withdrawal in withdrawals {
        balances
            .entry(withdrawal.broker_id)
            .or_default()
            .debit(withdrawal.amount_cents);
    }

    balances
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    NonPositiveAmount(Cents),
    InsufficientFunds { available: Cents, requested: Cents },
    /// A computed amount or resulting balance does not fit in [`Cents`]
    AmountOverflow,
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::NonPositiveAmount(amount) => {
                write!(f, "Withdrawal amount must be positive, got {} cents", amount)
            }
            LedgerError::InsufficientFunds {
                available,
                requested,
            } => write!(
                f,
                "Insufficient funds: {} cents available, {} cents requested",
                available, requested
            ),
            LedgerError::AmountOverflow => write!(f, "Amount out of range"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// A broker whose stored balances disagree with the records.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceMismatch {
    pub broker_id: BrokerId,
    pub stored: Balances,
    pub expected: Balances,
}

/// Result of checking stored balances against commission and withdrawal records.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub broker_count: usize,
    pub commission_count: usize,
    pub withdrawal_count: usize,
    pub negative_balances: Vec<BrokerId>,
    pub mismatches: Vec<BalanceMismatch>,
    pub duplicate_codes: Vec<String>,
    pub orphan_records: usize,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.negative_balances.is_empty()
            && self.mismatches.is_empty()
            && self.duplicate_codes.is_empty()
            && self.orphan_records == 0
    }
}

pub fn build_integrity_report(
    brokers: &[Broker],
    commissions: &[Commission],
    withdrawals: &[Withdrawal],
) -> IntegrityReport {
    let expected = expected_all_balances(commissions, withdrawals);
    let known: HashSet<BrokerId> = brokers.iter().map(|b| b.id).collect();

    let negative_balances = brokers
        .iter()
        .filter(|b| b.available_balance_cents < 0 || b.pending_balance_cents < 0)
        .map(|b| b.id)
        .collect();

    let mismatches = brokers
        .iter()
        .filter_map(|broker| {
            let stored = Balances::of(broker);
            let expected = expected.get(&broker.id).copied().unwrap_or_default();
            (stored != expected).then_some(BalanceMismatch {
                broker_id: broker.id,
                stored,
                expected,
            })
        })
        .collect();

    let mut seen = HashSet::new();
    let mut duplicate_codes: Vec<String> = brokers
        .iter()
        .filter_map(|b| b.broker_code.as_deref())
        .filter(|code| !seen.insert(*code))
        .map(str::to_string)
        .collect();
    duplicate_codes.sort();
    duplicate_codes.dedup();

    let orphan_records = commissions
        .iter()
        .filter(|c| !known.contains(&c.broker_id))
        .count()
        + withdrawals
            .iter()
            .filter(|w| !known.contains(&w.broker_id))
            .count();

    IntegrityReport {
        broker_count: brokers.len(),
        commission_count: commissions.len(),
        withdrawal_count: withdrawals.len(),
        negative_balances,
        mismatches,
        duplicate_codes,
        orphan_records,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn commission(broker: BrokerId, amount: Cents, status: CommissionStatus) -> Commission {
        let mut c = Commission::new(broker, amount * 10, 1_000, status).unwrap();
        c.commission_cents = amount;
        c
    }

    #[test]
    fn test_credit_goes_to_matching_bucket() {
        let mut balances = Balances::default();
        balances.credit(CommissionStatus::Pending, 5_000);
        balances.credit(CommissionStatus::Available, 2_000);
        assert_eq!(
            balances,
            Balances {
                available: 2_000,
                pending: 5_000
            }
        );
    }

    #[test]
    fn test_check_withdrawal_rejects_overdraft() {
        assert_eq!(
            check_withdrawal(1_000, 1_001),
            Err(LedgerError::InsufficientFunds {
                available: 1_000,
                requested: 1_001
            })
        );
        assert_eq!(check_withdrawal(1_000, 1_000), Ok(()));
    }

    #[test]
    fn test_check_withdrawal_rejects_non_positive() {
        assert_eq!(check_withdrawal(1_000, 0), Err(LedgerError::NonPositiveAmount(0)));
        assert_eq!(check_withdrawal(1_000, -5), Err(LedgerError::NonPositiveAmount(-5)));
    }

    #[test]
    fn test_available_never_negative_when_overdrafts_rejected() {
        let mut balances = Balances::default();
        let ops: [(bool, Cents); 8] = [
            (true, 3_000),
            (false, 2_000),
            (false, 2_000),
            (true, 500),
            (false, 1_500),
            (false, 1),
            (true, 10),
            (false, 10),
        ];
        for (is_credit, amount) in ops {
            if is_credit {
                balances.credit(CommissionStatus::Available, amount);
            } else if check_withdrawal(balances.available, amount).is_ok() {
                balances.available -= amount;
            }
            assert!(balances.available >= 0);
        }
        assert_eq!(balances.available, 0);
    }

    #[test]
    fn test_expected_balances() {
        let broker = Uuid::new_v4();
        let other = Uuid::new_v4();
        let commissions = vec![
            commission(broker, 5_000, CommissionStatus::Pending),
            commission(broker, 3_000, CommissionStatus::Available),
            commission(other, 7_000, CommissionStatus::Available),
        ];
        let withdrawals = vec![Withdrawal::new(broker, 1_000, "pix")];

        let balances = expected_balances(broker, &commissions, &withdrawals);
        assert_eq!(balances.available, 2_000);
        assert_eq!(balances.pending, 5_000);

        let all = expected_all_balances(&commissions, &withdrawals);
        assert_eq!(all.get(&broker), Some(&balances));
        assert_eq!(all.get(&other).map(|b| b.available), Some(7_000));
    }

    #[test]
    fn test_integrity_report_detects_mismatch_and_duplicates() {
        let mut a = Broker::new("A", "a@example.com").with_broker_code("BCTCR-00001");
        let b = Broker::new("B", "b@example.com").with_broker_code("BCTCR-00001");
        a.available_balance_cents = 3_000;

        let commissions = vec![commission(a.id, 2_000, CommissionStatus::Available)];
        let report = build_integrity_report(&[a.clone(), b], &commissions, &[]);

        assert!(!report.is_ok());
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].broker_id, a.id);
        assert_eq!(report.duplicate_codes, vec!["BCTCR-00001".to_string()]);
    }

    #[test]
    fn test_integrity_report_clean() {
        let mut a = Broker::new("A", "a@example.com").with_broker_code("BCTCR-00001");
        a.available_balance_cents = 1_500;
        a.pending_balance_cents = 4_000;

        let commissions = vec![
            commission(a.id, 2_000, CommissionStatus::Available),
            commission(a.id, 4_000, CommissionStatus::Pending),
        ];
        let withdrawals = vec![Withdrawal::new(a.id, 500, "pix")];

        let report = build_integrity_report(&[a], &commissions, &withdrawals);
        assert!(report.is_ok(), "{:?}", report);
        assert_eq!(report.commission_count, 2);
        assert_eq!(report.withdrawal_count, 1);
    }
}
