//! Per-participant shares of an expense. Rows are deleted together with
//! their expense.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{ExpenseShare, MoneyCents};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_participants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub expense_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub share_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn for_share(expense_id: Uuid, share: &ExpenseShare) -> Self {
        Self {
            expense_id: ActiveValue::Set(expense_id.to_string()),
            user_id: ActiveValue::Set(share.user_id.clone()),
            share_minor: ActiveValue::Set(share.share.cents()),
        }
    }
}

impl From<Model> for ExpenseShare {
    fn from(model: Model) -> Self {
        Self {
            user_id: model.user_id,
            share: MoneyCents::new(model.share_minor),
        }
    }
}
