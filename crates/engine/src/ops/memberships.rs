use std::collections::HashMap;

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, MembershipRole, ResultEngine, ValidationError, group_memberships, users,
    util::normalize_username,
};

use super::{Engine, GroupMember, with_tx};

impl Engine {
    /// Adds a user to the group as a plain member (owner-only).
    pub async fn add_member(
        &self,
        group_id: &str,
        member_username: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let member_username = normalize_username(member_username)?;
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_group_owner(&db_tx, group_id, &user_id).await?;
            self.require_user_exists(&db_tx, &member_username).await?;

            if self
                .membership_role(&db_tx, group_id, &member_username)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(member_username));
            }

            group_memberships::ActiveModel {
                group_id: ActiveValue::Set(group_id.to_string()),
                user_id: ActiveValue::Set(member_username.clone()),
                role: ActiveValue::Set(MembershipRole::Member.as_str().to_string()),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(group_id, member = %member_username, "member added");
            Ok(())
        })
    }

    /// Removes a member (owner-only).
    ///
    /// The owner cannot be removed, and neither can a member whose balance is
    /// not settled: their past expenses would keep counting with nobody left
    /// to pay or receive.
    pub async fn remove_member(
        &self,
        group_id: &str,
        member_username: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let member_username = normalize_username(member_username)?;
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            let group = self.require_group_owner(&db_tx, group_id, &user_id).await?;
            if member_username == group.owner {
                return Err(EngineError::Forbidden(
                    "cannot remove group owner".to_string(),
                ));
            }
            if self
                .membership_role(&db_tx, group_id, &member_username)
                .await?
                .is_none()
            {
                return Err(EngineError::KeyNotFound("member not exists".to_string()));
            }

            let balances = self
                .load_ledger_facts(&db_tx, group_id)
                .await?
                .compute_balances();
            if let Some(open) = balances
                .into_iter()
                .find(|b| b.user_id == member_username && !b.balance.is_settled())
            {
                return Err(ValidationError::MemberHasBalance {
                    user: member_username,
                    balance: open.balance,
                }
                .into());
            }

            group_memberships::Entity::delete_by_id((group_id.to_string(), member_username.clone()))
                .exec(&db_tx)
                .await?;

            tracing::info!(group_id, member = %member_username, "member removed");
            Ok(())
        })
    }

    /// Lists the members of a group, owner first (any member may ask).
    pub async fn list_members(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<Vec<GroupMember>> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_group_member(&db_tx, group_id, &user_id).await?;

            let rows = group_memberships::Entity::find()
                .filter(group_memberships::Column::GroupId.eq(group_id.to_string()))
                .order_by_asc(group_memberships::Column::UserId)
                .all(&db_tx)
                .await?;
            let names: HashMap<String, String> = users::Entity::find()
                .filter(users::Column::Username.is_in(rows.iter().map(|m| m.user_id.clone())))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|u| (u.username, u.display_name))
                .collect();

            let mut members = rows
                .into_iter()
                .map(|m| {
                    Ok(GroupMember {
                        display_name: names
                            .get(&m.user_id)
                            .cloned()
                            .unwrap_or_else(|| m.user_id.clone()),
                        role: MembershipRole::try_from(m.role.as_str())?,
                        user_id: m.user_id,
                    })
                })
                .collect::<ResultEngine<Vec<_>>>()?;
            members.sort_by_key(|m| m.role != MembershipRole::Owner);
            Ok(members)
        })
    }
}
