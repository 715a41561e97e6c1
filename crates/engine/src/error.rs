//! The module contains the errors the engine can throw.
//!
//! Calculation reads ([`Engine::group_balances`], [`Engine::group_debts`])
//! only ever fail with [`Database`]. Mutations additionally reject bad input
//! with [`Validation`], naming the violated condition.
//!
//!  [`Engine::group_balances`]: crate::Engine::group_balances
//!  [`Engine::group_debts`]: crate::Engine::group_debts
//!  [`Database`]: EngineError::Database
//!  [`Validation`]: EngineError::Validation
use sea_orm::DbErr;
use thiserror::Error;

use crate::MoneyCents;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// Rejections raised by the expense and settlement mutators.
///
/// Stored expenses must satisfy `Σ shares == amount`; balances stop summing
/// to zero as soon as one row breaks it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("group {0} does not exist")]
    GroupNotFound(String),
    #[error("amount must be > 0, got {0}")]
    NonPositiveAmount(MoneyCents),
    #[error("expense has no participants")]
    NoParticipants,
    #[error("participant {0} listed more than once")]
    DuplicateParticipant(String),
    #[error("share of {user} must be >= 0, got {share}")]
    NegativeShare { user: String, share: MoneyCents },
    #[error("payer {0} is not a member of the group")]
    PayerNotMember(String),
    #[error("participants not members of the group: {}", .0.join(", "))]
    ParticipantsNotMembers(Vec<String>),
    #[error("shares sum to {shares}, expense amount is {amount}")]
    ShareSumMismatch {
        amount: MoneyCents,
        shares: MoneyCents,
    },
    #[error("{0} cannot settle with themselves")]
    SelfSettlement(String),
    #[error("settlement party {0} is not a member of the group")]
    SettlementPartyNotMember(String),
    #[error("{user} still has an open balance of {balance}")]
    MemberHasBalance { user: String, balance: MoneyCents },
}
