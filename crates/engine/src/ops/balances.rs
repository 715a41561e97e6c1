use std::collections::BTreeSet;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    Expense, GroupBalances, GroupDebts, LedgerFacts, ResultEngine, Settlement,
    expense_participants, expenses, minimize_debts, settlements, users,
};

use super::{Engine, with_tx};

impl Engine {
    /// Net balance of every user involved in the group.
    ///
    /// An unknown or empty group yields an empty list rather than an error,
    /// so freshly created or just deleted groups degrade gracefully.
    pub async fn group_balances(&self, group_id: &str) -> ResultEngine<GroupBalances> {
        with_tx!(self, |db_tx| {
            let balances = self
                .load_ledger_facts(&db_tx, group_id)
                .await?
                .compute_balances();
            tracing::debug!(group_id, users = balances.len(), "balances computed");
            Ok(GroupBalances {
                group_id: group_id.to_string(),
                balances,
            })
        })
    }

    /// Suggested payments that settle the group (see [`minimize_debts`]).
    ///
    /// Like [`group_balances`](Self::group_balances), an unknown group yields
    /// an empty list.
    pub async fn group_debts(&self, group_id: &str) -> ResultEngine<GroupDebts> {
        with_tx!(self, |db_tx| {
            let balances = self
                .load_ledger_facts(&db_tx, group_id)
                .await?
                .compute_balances();
            let debts = minimize_debts(&balances);
            tracing::debug!(group_id, debts = debts.len(), "debts computed");
            Ok(GroupDebts {
                group_id: group_id.to_string(),
                debts,
            })
        })
    }

    /// Reads every expense (with shares) and settlement of a group, plus the
    /// display names of the users they mention.
    pub(super) async fn load_ledger_facts(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<LedgerFacts> {
        let expenses = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(expenses::Column::OccurredAt)
            .order_by_asc(expenses::Column::Id)
            .find_with_related(expense_participants::Entity)
            .all(db)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        let settlements = settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(settlements::Column::OccurredAt)
            .order_by_asc(settlements::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Settlement::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;

        let mut involved: BTreeSet<String> = BTreeSet::new();
        for expense in &expenses {
            involved.insert(expense.paid_by.clone());
            involved.extend(expense.participants.iter().map(|p| p.user_id.clone()));
        }
        for settlement in &settlements {
            involved.insert(settlement.from_user.clone());
            involved.insert(settlement.to_user.clone());
        }

        let user_names = if involved.is_empty() {
            Default::default()
        } else {
            users::Entity::find()
                .filter(users::Column::Username.is_in(involved))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.username, u.display_name))
                .collect()
        };

        Ok(LedgerFacts {
            expenses,
            settlements,
            user_names,
        })
    }
}
