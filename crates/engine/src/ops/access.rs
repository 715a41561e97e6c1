use std::collections::HashSet;

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};

use crate::{
    EngineError, MembershipRole, ResultEngine, ValidationError, group_memberships, groups, users,
};

use super::Engine;

impl Engine {
    pub(super) async fn find_group(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<Option<groups::Model>> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn membership_role(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<Option<MembershipRole>> {
        let row = group_memberships::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
            .one(db)
            .await?;
        row.as_ref()
            .map(|m| MembershipRole::try_from(m.role.as_str()))
            .transpose()
    }

    /// Loads the group and checks that `user_id` belongs to it.
    pub(super) async fn require_group_member(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<groups::Model> {
        let group = self
            .find_group(db, group_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))?;
        self.require_member_of(db, &group, user_id).await?;
        Ok(group)
    }

    /// Like [`require_group_member`](Self::require_group_member), for the
    /// mutators: a missing group is a validation failure there.
    pub(super) async fn require_group_for_write(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<groups::Model> {
        let group = self
            .find_group(db, group_id)
            .await?
            .ok_or_else(|| ValidationError::GroupNotFound(group_id.to_string()))?;
        self.require_member_of(db, &group, user_id).await?;
        Ok(group)
    }

    async fn require_member_of(
        &self,
        db: &DatabaseTransaction,
        group: &groups::Model,
        user_id: &str,
    ) -> ResultEngine<()> {
        if self.membership_role(db, &group.id, user_id).await?.is_none() {
            return Err(EngineError::Forbidden(format!(
                "{user_id} is not a member of the group"
            )));
        }
        Ok(())
    }

    pub(super) async fn require_group_owner(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
        user_id: &str,
    ) -> ResultEngine<groups::Model> {
        let group = self.require_group_member(db, group_id, user_id).await?;
        if group.owner != user_id {
            return Err(EngineError::Forbidden(
                "only the group owner can do this".to_string(),
            ));
        }
        Ok(group)
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    pub(super) async fn member_ids(
        &self,
        db: &DatabaseTransaction,
        group_id: &str,
    ) -> ResultEngine<HashSet<String>> {
        let rows = group_memberships::Entity::find()
            .filter(group_memberships::Column::GroupId.eq(group_id.to_string()))
            .all(db)
            .await?;
        Ok(rows.into_iter().map(|m| m.user_id).collect())
    }
}
