use thiserror::Error;

use crate::domain::{Cents, LedgerError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Field {0} is required")]
    MissingField(&'static str),

    #[error("Email already registered: {0}")]
    EmailAlreadyRegistered(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot change status from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("Broker not found: {0}")]
    BrokerNotFound(String),

    #[error("Commission not found: {0}")]
    CommissionNotFound(String),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Insufficient funds: balance {available}, requested {requested}")]
    InsufficientFunds { available: Cents, requested: Cents },

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Coarse classification used by the transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    InsufficientFunds,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_)
            | AppError::MissingField(_)
            | AppError::EmailAlreadyRegistered(_)
            | AppError::InvalidAmount(_)
            | AppError::InvalidStatusTransition { .. }
            | AppError::InvalidOrExpiredCode => ErrorKind::Validation,
            AppError::BrokerNotFound(_)
            | AppError::CommissionNotFound(_)
            | AppError::WithdrawalNotFound(_) => ErrorKind::NotFound,
            AppError::InvalidCredentials => ErrorKind::Unauthorized,
            AppError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            AppError::PasswordHash(_) | AppError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NonPositiveAmount(_) => {
                AppError::InvalidAmount("Amount must be positive".to_string())
            }
            LedgerError::InsufficientFunds {
                available,
                requested,
            } => AppError::InsufficientFunds {
                available,
                requested,
            },
            LedgerError::AmountOverflow => {
                AppError::InvalidAmount("Amount out of range".to_string())
            }
        }
    }
}
