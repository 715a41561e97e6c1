//! Suggested payments that settle a group.
//!
//! Greedy two-pointer matching: the biggest creditor is paid by the biggest
//! debtor until one of them is square, then the pointer for whoever reached
//! zero moves on. Every step retires at least one user, so a group with `n`
//! unsettled users gets at most `n - 1` payments.
//!
//! This is a heuristic. Finding the true minimum number of transfers is
//! NP-hard, and some inputs admit fewer payments than the greedy finds (e.g.
//! when a subset of debtors exactly cancels a subset of creditors).
//!
//! # Example
//!
//! ```text
//! Balances:  A +25   B +5   C -15   D -15
//!
//! Creditors (desc): A 25, B 5
//! Debtors   (asc):  C -15, D -15
//!
//!   C pays A 15   -> A 10, C done
//!   D pays A 10   -> A done, D 5
//!   D pays B 5    -> both done
//! ```

use serde::{Deserialize, Serialize};

use crate::{MoneyCents, SETTLE_EPSILON, UserBalance};

/// A suggested payment from a debtor to a creditor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debt {
    pub from_user: String,
    pub from_user_name: String,
    pub to_user: String,
    pub to_user_name: String,
    pub amount: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDebts {
    pub group_id: String,
    pub debts: Vec<Debt>,
}

/// A user still to be matched, with the magnitude left to pay or receive.
struct Open<'a> {
    user: &'a UserBalance,
    remaining: MoneyCents,
}

/// Largest magnitude first; equal magnitudes by `user_id` so the output is
/// stable for a given input.
fn sort_open(open: &mut [Open<'_>]) {
    open.sort_by(|a, b| {
        b.remaining
            .cmp(&a.remaining)
            .then_with(|| a.user.user_id.cmp(&b.user.user_id))
    });
}

/// Computes the payments that bring every balance within
/// [`SETTLE_EPSILON`] of zero.
///
/// Balances within the epsilon count as settled and never appear in the
/// result. Leftovers at or below the epsilon are dropped.
pub fn minimize_debts(balances: &[UserBalance]) -> Vec<Debt> {
    let mut creditors: Vec<Open<'_>> = balances
        .iter()
        .filter(|b| b.balance > SETTLE_EPSILON)
        .map(|user| Open {
            user,
            remaining: user.balance,
        })
        .collect();
    let mut debtors: Vec<Open<'_>> = balances
        .iter()
        .filter(|b| b.balance < -SETTLE_EPSILON)
        .map(|user| Open {
            user,
            remaining: user.balance.abs(),
        })
        .collect();

    sort_open(&mut creditors);
    sort_open(&mut debtors);

    let mut debts = Vec::with_capacity((creditors.len() + debtors.len()).saturating_sub(1));
    let (mut ci, mut di) = (0, 0);
    while ci < creditors.len() && di < debtors.len() {
        let creditor = &mut creditors[ci];
        let debtor = &mut debtors[di];

        let amount = creditor.remaining.min(debtor.remaining);
        if amount > SETTLE_EPSILON {
            debts.push(Debt {
                from_user: debtor.user.user_id.clone(),
                from_user_name: debtor.user.user_name.clone(),
                to_user: creditor.user.user_id.clone(),
                to_user_name: creditor.user.user_name.clone(),
                amount,
            });
        }

        creditor.remaining -= amount;
        debtor.remaining -= amount;

        if creditor.remaining.is_settled() {
            ci += 1;
        }
        if debtor.remaining.is_settled() {
            di += 1;
        }
    }

    debts
}
