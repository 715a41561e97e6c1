use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, Expense, ExpenseCmd, ExpenseShare, MoneyCents, ResultEngine, SETTLE_EPSILON,
    ValidationError, expense_participants, expenses,
    util::{normalize_optional_text, normalize_username},
};

use super::{Engine, with_tx};

/// Checks that do not need the database: positive amount, well-formed shares
/// and `Σ shares == amount` within the settle epsilon.
///
/// A residue within the epsilon is folded into one share (the payer's when
/// they take part, otherwise the first participant able to absorb it), so the
/// stored shares always sum to the amount exactly.
fn normalize_shares(
    amount: MoneyCents,
    paid_by: &str,
    mut shares: Vec<ExpenseShare>,
) -> ResultEngine<Vec<ExpenseShare>> {
    if !amount.is_positive() {
        return Err(ValidationError::NonPositiveAmount(amount).into());
    }
    if shares.is_empty() {
        return Err(ValidationError::NoParticipants.into());
    }

    let mut seen = HashSet::with_capacity(shares.len());
    for share in &shares {
        if !seen.insert(share.user_id.as_str()) {
            return Err(ValidationError::DuplicateParticipant(share.user_id.clone()).into());
        }
        if share.share.is_negative() {
            return Err(ValidationError::NegativeShare {
                user: share.user_id.clone(),
                share: share.share,
            }
            .into());
        }
    }

    let total: MoneyCents = shares.iter().map(|s| s.share).sum();
    let residue = amount - total;
    if residue.abs() > SETTLE_EPSILON {
        return Err(ValidationError::ShareSumMismatch {
            amount,
            shares: total,
        }
        .into());
    }
    if residue != MoneyCents::ZERO {
        let absorbs = |s: &ExpenseShare| !(s.share + residue).is_negative();
        let target = shares
            .iter()
            .position(|s| s.user_id == paid_by && absorbs(s))
            .or_else(|| shares.iter().position(absorbs));
        // Σ shares > 0 whenever the residue is negative, so some share absorbs it.
        if let Some(idx) = target {
            shares[idx].share += residue;
        }
    }
    Ok(shares)
}

impl Engine {
    /// Records an expense and its shares in one DB transaction.
    ///
    /// Rejected (and nothing persisted) when the group is missing, the acting
    /// user is not a member, the payer or any participant is not a member, or
    /// the shares do not add up to the amount.
    pub async fn create_expense(&self, cmd: ExpenseCmd) -> ResultEngine<Uuid> {
        let user_id = normalize_username(&cmd.user_id)?;
        let paid_by = normalize_username(&cmd.paid_by)?;
        let participants = cmd
            .split
            .shares(cmd.amount)
            .into_iter()
            .map(|share| {
                Ok(ExpenseShare {
                    user_id: normalize_username(&share.user_id)?,
                    share: share.share,
                })
            })
            .collect::<ResultEngine<Vec<_>>>()?;
        let description = normalize_optional_text(Some(&cmd.description)).unwrap_or_default();
        let group_id = cmd.group_id;

        with_tx!(self, |db_tx| {
            self.require_group_for_write(&db_tx, &group_id, &user_id)
                .await?;
            let participants = normalize_shares(cmd.amount, &paid_by, participants)?;

            let members = self.member_ids(&db_tx, &group_id).await?;
            if !members.contains(&paid_by) {
                return Err(ValidationError::PayerNotMember(paid_by).into());
            }
            let outsiders: Vec<String> = participants
                .iter()
                .filter(|p| !members.contains(&p.user_id))
                .map(|p| p.user_id.clone())
                .collect();
            if !outsiders.is_empty() {
                return Err(ValidationError::ParticipantsNotMembers(outsiders).into());
            }

            let expense = Expense {
                id: Uuid::new_v4(),
                group_id: group_id.clone(),
                paid_by: paid_by.clone(),
                amount: cmd.amount,
                description: description.clone(),
                occurred_at: cmd.occurred_at,
                created_by: user_id.clone(),
                created_at: Utc::now(),
                participants: participants.clone(),
            };

            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            expense_participants::Entity::insert_many(
                expense
                    .participants
                    .iter()
                    .map(|share| expense_participants::ActiveModel::for_share(expense.id, share)),
            )
            .exec(&db_tx)
            .await?;

            tracing::info!(
                group_id = %expense.group_id,
                expense_id = %expense.id,
                paid_by = %expense.paid_by,
                amount = %expense.amount,
                participants = expense.participants.len(),
                "expense created"
            );
            Ok(expense.id)
        })
    }

    /// Returns one expense with its shares.
    pub async fn expense(
        &self,
        group_id: &str,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Expense> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_group_member(&db_tx, group_id, &user_id)
                .await?;
            let model = expenses::Entity::find_by_id(expense_id.to_string())
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
            let shares = expense_participants::Entity::find()
                .filter(expense_participants::Column::ExpenseId.eq(model.id.clone()))
                .order_by_asc(expense_participants::Column::UserId)
                .all(&db_tx)
                .await?;
            Expense::try_from((model, shares))
        })
    }

    /// Lists a group's expenses, newest first.
    pub async fn list_expenses(&self, group_id: &str, user_id: &str) -> ResultEngine<Vec<Expense>> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_group_member(&db_tx, group_id, &user_id)
                .await?;
            expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(expenses::Column::OccurredAt)
                .order_by_desc(expenses::Column::Id)
                .find_with_related(expense_participants::Entity)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Expense::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Deletes an expense and its shares. Allowed for whoever recorded it and
    /// for the group owner.
    pub async fn delete_expense(
        &self,
        group_id: &str,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            let group = self
                .require_group_member(&db_tx, group_id, &user_id)
                .await?;
            let model = expenses::Entity::find_by_id(expense_id.to_string())
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
            if model.created_by != user_id && group.owner != user_id {
                return Err(EngineError::Forbidden(
                    "only the creator or the group owner can delete an expense".to_string(),
                ));
            }

            expense_participants::Entity::delete_many()
                .filter(expense_participants::Column::ExpenseId.eq(model.id.clone()))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(model.id.clone())
                .exec(&db_tx)
                .await?;

            tracing::info!(group_id, expense_id = %expense_id, "expense deleted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares(values: &[(&str, i64)]) -> Vec<ExpenseShare> {
        values
            .iter()
            .map(|(user, cents)| ExpenseShare {
                user_id: (*user).to_string(),
                share: MoneyCents::new(*cents),
            })
            .collect()
    }

    fn pairs(shares: &[ExpenseShare]) -> Vec<(&str, i64)> {
        shares
            .iter()
            .map(|s| (s.user_id.as_str(), s.share.cents()))
            .collect()
    }

    #[test]
    fn exact_shares_are_kept_as_given() {
        let normalized = normalize_shares(
            MoneyCents::new(1000),
            "a",
            shares(&[("a", 500), ("b", 500)]),
        )
        .unwrap();
        assert_eq!(pairs(&normalized), vec![("a", 500), ("b", 500)]);
    }

    #[test]
    fn one_cent_residue_goes_to_the_payer() {
        let normalized = normalize_shares(
            MoneyCents::new(1000),
            "b",
            shares(&[("a", 333), ("b", 333), ("c", 333)]),
        )
        .unwrap();
        assert_eq!(pairs(&normalized), vec![("a", 333), ("b", 334), ("c", 333)]);

        let normalized = normalize_shares(
            MoneyCents::new(1000),
            "a",
            shares(&[("a", 334), ("b", 334), ("c", 333)]),
        )
        .unwrap();
        assert_eq!(pairs(&normalized), vec![("a", 333), ("b", 334), ("c", 333)]);
    }

    #[test]
    fn residue_falls_back_to_a_participant_that_can_absorb_it() {
        // Payer outside the split: the first participant takes the cent.
        let normalized = normalize_shares(
            MoneyCents::new(1000),
            "z",
            shares(&[("a", 333), ("b", 333), ("c", 333)]),
        )
        .unwrap();
        assert_eq!(pairs(&normalized), vec![("a", 334), ("b", 333), ("c", 333)]);

        // A zero share cannot go negative, so the next one pays the cent back.
        let normalized =
            normalize_shares(MoneyCents::new(500), "a", shares(&[("a", 0), ("b", 501)])).unwrap();
        assert_eq!(pairs(&normalized), vec![("a", 0), ("b", 500)]);
    }

    #[test]
    fn normalized_shares_always_sum_to_the_amount() {
        for (amount, values) in [
            (1000, vec![("a", 333), ("b", 333), ("c", 333)]),
            (1000, vec![("a", 334), ("b", 334), ("c", 333)]),
            (1, vec![("a", 0), ("b", 0)]),
            (7, vec![("a", 8)]),
        ] {
            let normalized =
                normalize_shares(MoneyCents::new(amount), "a", shares(&values)).unwrap();
            let total: MoneyCents = normalized.iter().map(|s| s.share).sum();
            assert_eq!(total.cents(), amount);
            assert!(normalized.iter().all(|s| !s.share.is_negative()));
        }
    }

    #[test]
    fn share_sum_mismatch_is_rejected() {
        assert_eq!(
            normalize_shares(MoneyCents::new(1000), "a", shares(&[("a", 500), ("b", 400)])),
            Err(EngineError::Validation(ValidationError::ShareSumMismatch {
                amount: MoneyCents::new(1000),
                shares: MoneyCents::new(900),
            }))
        );
    }

    #[test]
    fn malformed_shares_are_rejected() {
        assert_eq!(
            normalize_shares(MoneyCents::ZERO, "a", shares(&[("a", 0)])),
            Err(ValidationError::NonPositiveAmount(MoneyCents::ZERO).into())
        );
        assert_eq!(
            normalize_shares(MoneyCents::new(100), "a", Vec::new()),
            Err(ValidationError::NoParticipants.into())
        );
        assert_eq!(
            normalize_shares(MoneyCents::new(100), "a", shares(&[("a", 50), ("a", 50)])),
            Err(ValidationError::DuplicateParticipant("a".to_string()).into())
        );
        assert_eq!(
            normalize_shares(MoneyCents::new(100), "a", shares(&[("a", 150), ("b", -50)])),
            Err(ValidationError::NegativeShare {
                user: "b".to_string(),
                share: MoneyCents::new(-50),
            }
            .into())
        );
    }
}
