use chrono::Utc;
use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait, prelude::*,
};

use crate::{
    Group, MembershipRole, ResultEngine, group_memberships, groups,
    util::{normalize_required_name, normalize_username},
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates a group owned by `user_id`. The owner is also its first member.
    pub async fn create_group(&self, name: &str, user_id: &str) -> ResultEngine<String> {
        let name = normalize_required_name(name, "group")?;
        let user_id = normalize_username(user_id)?;

        let group = Group::new(name, &user_id, Utc::now());
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, &user_id).await?;

            groups::ActiveModel::from(&group).insert(&db_tx).await?;
            group_memberships::ActiveModel {
                group_id: ActiveValue::Set(group.id.clone()),
                user_id: ActiveValue::Set(user_id.clone()),
                role: ActiveValue::Set(MembershipRole::Owner.as_str().to_string()),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(group_id = %group.id, owner = %user_id, "group created");
            Ok(group.id.clone())
        })
    }

    /// Returns the group if `user_id` is a member.
    pub async fn group(&self, group_id: &str, user_id: &str) -> ResultEngine<Group> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            let model = self
                .require_group_member(&db_tx, group_id, &user_id)
                .await?;
            Ok(Group::from(model))
        })
    }

    /// Groups `user_id` belongs to, by name.
    pub async fn list_groups(&self, user_id: &str) -> ResultEngine<Vec<Group>> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            let models = groups::Entity::find()
                .inner_join(group_memberships::Entity)
                .filter(group_memberships::Column::UserId.eq(user_id.clone()))
                .order_by_asc(groups::Column::Name)
                .order_by_asc(groups::Column::Id)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(Group::from).collect())
        })
    }

    /// Renames a group (owner-only).
    pub async fn rename_group(
        &self,
        group_id: &str,
        name: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        let name = normalize_required_name(name, "group")?;
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            self.require_group_owner(&db_tx, group_id, &user_id).await?;
            groups::ActiveModel {
                id: ActiveValue::Set(group_id.to_string()),
                name: ActiveValue::Set(name),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(())
        })
    }

    /// Deletes a group and every fact recorded in it (owner-only).
    pub async fn delete_group(&self, group_id: &str, user_id: &str) -> ResultEngine<()> {
        let user_id = normalize_username(user_id)?;
        with_tx!(self, |db_tx| {
            let group = self.require_group_owner(&db_tx, group_id, &user_id).await?;

            // Cascade by hand so the result does not depend on the connection
            // having foreign keys enabled.
            let backend = self.database.get_database_backend();
            for sql in [
                "DELETE FROM expense_participants WHERE expense_id IN (SELECT id FROM expenses WHERE group_id = ?);",
                "DELETE FROM expenses WHERE group_id = ?;",
                "DELETE FROM settlements WHERE group_id = ?;",
                "DELETE FROM group_memberships WHERE group_id = ?;",
                "DELETE FROM groups WHERE id = ?;",
            ] {
                db_tx
                    .execute(Statement::from_sql_and_values(
                        backend,
                        sql,
                        vec![group.id.clone().into()],
                    ))
                    .await?;
            }

            tracing::info!(group_id = %group.id, "group deleted");
            Ok(())
        })
    }
}
