//! Command structs for engine write operations.
//!
//! These types group parameters for expense and settlement creation, keeping
//! call sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};

use crate::{ExpenseShare, MoneyCents};

/// How an expense amount is divided among participants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Split {
    /// Even shares; leftover cents go to the first users listed.
    Equal(Vec<String>),
    /// Explicit shares, which must sum to the expense amount.
    Exact(Vec<ExpenseShare>),
}

impl Split {
    /// Resolves the split into concrete shares for `amount`.
    pub fn shares(&self, amount: MoneyCents) -> Vec<ExpenseShare> {
        match self {
            Self::Equal(users) => users
                .iter()
                .zip(amount.split_even(users.len()))
                .map(|(user_id, share)| ExpenseShare {
                    user_id: user_id.clone(),
                    share,
                })
                .collect(),
            Self::Exact(shares) => shares.clone(),
        }
    }
}

/// Create an expense.
#[derive(Clone, Debug)]
pub struct ExpenseCmd {
    pub group_id: String,
    pub paid_by: String,
    pub amount: MoneyCents,
    pub description: String,
    pub split: Split,
    pub occurred_at: DateTime<Utc>,
    pub user_id: String,
}

impl ExpenseCmd {
    /// An expense paid by the acting user. Set the shares with
    /// [`split_equally`](Self::split_equally) or [`split_exact`](Self::split_exact).
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: MoneyCents,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            group_id: group_id.into(),
            paid_by: user_id.clone(),
            amount,
            description: description.into(),
            split: Split::Equal(Vec::new()),
            occurred_at,
            user_id,
        }
    }

    #[must_use]
    pub fn paid_by(mut self, paid_by: impl Into<String>) -> Self {
        self.paid_by = paid_by.into();
        self
    }

    #[must_use]
    pub fn split_equally<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.split = Split::Equal(participants.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn split_exact<I, S>(mut self, shares: I) -> Self
    where
        I: IntoIterator<Item = (S, MoneyCents)>,
        S: Into<String>,
    {
        self.split = Split::Exact(
            shares
                .into_iter()
                .map(|(user_id, share)| ExpenseShare {
                    user_id: user_id.into(),
                    share,
                })
                .collect(),
        );
        self
    }
}

/// Record a payment from `from_user` to `to_user`.
#[derive(Clone, Debug)]
pub struct SettlementCmd {
    pub group_id: String,
    pub from_user: String,
    pub to_user: String,
    pub amount: MoneyCents,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub user_id: String,
}

impl SettlementCmd {
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        user_id: impl Into<String>,
        from_user: impl Into<String>,
        to_user: impl Into<String>,
        amount: MoneyCents,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            from_user: from_user.into(),
            to_user: to_user.into(),
            amount,
            description: None,
            occurred_at,
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
