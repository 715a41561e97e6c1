//! Net balance per user, derived from a group's expenses and settlements.
//!
//! For every user that ever paid, participated in an expense, or was party to
//! a settlement:
//!
//! ```text
//! balance = Σ expenses paid
//!         - Σ shares owed
//!         + Σ settlements received
//!         - Σ settlements sent
//! ```
//!
//! Each expense credits its payer exactly what it debits its participants,
//! and each settlement credits one user what it debits another, so the
//! balances of a group always sum to zero.
//!
//! Nothing here is cached: balances are a pure function of the facts and are
//! recomputed on every read.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{Expense, MoneyCents, Settlement};

/// A user's net position in a group.
///
/// Positive = the user is owed money, negative = the user owes money.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: String,
    pub user_name: String,
    pub balance: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalances {
    pub group_id: String,
    pub balances: Vec<UserBalance>,
}

/// Everything the calculator needs to know about one group.
#[derive(Clone, Debug, Default)]
pub struct LedgerFacts {
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
    /// Display names by user id. Users missing here are named by their id.
    pub user_names: HashMap<String, String>,
}

impl LedgerFacts {
    /// Folds the facts into one balance per involved user, ordered by
    /// `user_id`.
    pub fn compute_balances(&self) -> Vec<UserBalance> {
        let mut totals: BTreeMap<&str, MoneyCents> = BTreeMap::new();

        for expense in &self.expenses {
            *totals.entry(expense.paid_by.as_str()).or_default() += expense.amount;
            for participant in &expense.participants {
                *totals.entry(participant.user_id.as_str()).or_default() -= participant.share;
            }
        }

        for settlement in &self.settlements {
            *totals.entry(settlement.to_user.as_str()).or_default() += settlement.amount;
            *totals.entry(settlement.from_user.as_str()).or_default() -= settlement.amount;
        }

        totals
            .into_iter()
            .map(|(user_id, balance)| UserBalance {
                user_id: user_id.to_string(),
                user_name: self.user_name(user_id).to_string(),
                balance,
            })
            .collect()
    }

    fn user_name<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.user_names
            .get(user_id)
            .map(String::as_str)
            .unwrap_or(user_id)
    }
}
