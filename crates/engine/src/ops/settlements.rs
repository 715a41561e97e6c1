use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Debt, EngineError, ResultEngine, Settlement, SettlementCmd, ValidationError, minimize_debts,
    settlements,
    util::{normalize_optional_text, normalize_username},
};

use super::{Engine, with_tx};

impl Engine {
    /// Records a payment between two members.
    ///
    /// No check is made against outstanding debts: an over-payment or an
    /// unrelated transfer is accepted and simply shifts both balances.
    pub async fn create_settlement(&self, cmd: SettlementCmd) -> ResultEngine<Uuid> {
        let user_id = normalize_username(&cmd.user_id)?;
        let from_user = normalize_username(&cmd.from_user)?;
        let to_user = normalize_username(&cmd.to_user)?;
        let description = normalize_optional_text(cmd.description.as_deref());
        let group_id = cmd.group_id;

        with_tx!(self, |db_tx| {
            self.require_group_for_write(&db_tx, &group_id, &user_id)
                .await?;
            let settlement = Settlement {
                id: Uuid::new_v4(),
                group_id: group_id.clone(),
                from_user,
                to_user,
                amount: cmd.amount,
                description: description.clone(),
                occurred_at: cmd.occurred_at,
                created_by: user_id.clone(),
                created_at: Utc::now(),
            };
            self.insert_settlement(&db_tx, &settlement).await?;
            Ok(settlement.id)
        })
    }

    /// Validates and stores a settlement inside the caller's transaction.
    /// Group and actor checks are the caller's job.
    async fn insert_settlement(
        &self,
        db_tx: &DatabaseTransaction,
        settlement: &Settlement,
    ) -> ResultEngine<()> {
        if !settlement.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(settlement.amount).into());
        }
        if settlement.from_user == settlement.to_user {
            return Err(ValidationError::SelfSettlement(settlement.from_user.clone()).into());
        }

        let members = self.member_ids(db_tx, &settlement.group_id).await?;
        for party in [&settlement.from_user, &settlement.to_user] {
            if !members.contains(party) {
                return Err(ValidationError::SettlementPartyNotMember(party.clone()).into());
            }
        }

        settlements::ActiveModel::from(settlement)
            .insert(db_tx)
            .await?;

        tracing::info!(
            group_id = %settlement.group_id,
            settlement_id = %settlement.id,
            from = %settlement.from_user,
            to = %settlement.to_user,
            amount = %settlement.amount,
            "settlement recorded"
        );
        Ok(())
    }

    /// Marks a suggested [`Debt`] as paid by recording it as a settlement.
    pub async fn settle_debt(
        &self,
        group_id: &str,
        debt: &Debt,
        user_id: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Uuid> {
        self.create_settlement(
            SettlementCmd::new(
                group_id,
                user_id,
                debt.from_user.as_str(),
                debt.to_user.as_str(),
                debt.amount,
                occurred_at,
            )
            .description("settle up"),
        )
        .await
    }

    /// Records every currently suggested payment of the group as settled, in
    /// one DB transaction: either the whole group is squared or nothing is
    /// written. Returns the debts that were recorded.
    pub async fn settle_group(
        &self,
        group_id: &str,
        user_id: &str,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Vec<Debt>> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_group_for_write(&db_tx, group_id, &user_id)
                .await?;
            let balances = self
                .load_ledger_facts(&db_tx, group_id)
                .await?
                .compute_balances();
            let debts = minimize_debts(&balances);

            for debt in &debts {
                let settlement = Settlement {
                    id: Uuid::new_v4(),
                    group_id: group_id.to_string(),
                    from_user: debt.from_user.clone(),
                    to_user: debt.to_user.clone(),
                    amount: debt.amount,
                    description: Some("settle up".to_string()),
                    occurred_at,
                    created_by: user_id.clone(),
                    created_at: Utc::now(),
                };
                self.insert_settlement(&db_tx, &settlement).await?;
            }

            tracing::info!(group_id, settled = debts.len(), "group settled");
            Ok(debts)
        })
    }

    /// Lists a group's settlements, newest first.
    pub async fn list_settlements(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<Vec<Settlement>> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_group_member(&db_tx, group_id, &user_id)
                .await?;
            settlements::Entity::find()
                .filter(settlements::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(settlements::Column::OccurredAt)
                .order_by_desc(settlements::Column::Id)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Settlement::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Deletes a settlement. Allowed for whoever recorded it and for the
    /// group owner.
    pub async fn delete_settlement(
        &self,
        group_id: &str,
        settlement_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            let group = self
                .require_group_member(&db_tx, group_id, &user_id)
                .await?;
            let model = settlements::Entity::find_by_id(settlement_id.to_string())
                .filter(settlements::Column::GroupId.eq(group_id.to_string()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("settlement not exists".to_string()))?;
            if model.created_by != user_id && group.owner != user_id {
                return Err(EngineError::Forbidden(
                    "only the creator or the group owner can delete a settlement".to_string(),
                ));
            }

            settlements::Entity::delete_by_id(model.id)
                .exec(&db_tx)
                .await?;

            tracing::info!(group_id, settlement_id = %settlement_id, "settlement deleted");
            Ok(())
        })
    }
}
