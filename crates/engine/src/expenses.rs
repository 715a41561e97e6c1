//! Expense primitives.
//!
//! An `Expense` is money paid by one member on behalf of one or more
//! participants. The participants' shares always sum to the amount.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, expense_participants, util::parse_uuid};

/// One participant's portion of an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub user_id: String,
    pub share: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: String,
    pub paid_by: String,
    pub amount: MoneyCents,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<ExpenseShare>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub paid_by: String,
    pub amount_minor: i64,
    pub description: String,
    pub occurred_at: DateTimeUtc,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
    #[sea_orm(has_many = "super::expense_participants::Entity")]
    Participants,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::expense_participants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(expense.group_id.clone()),
            paid_by: ActiveValue::Set(expense.paid_by.clone()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            description: ActiveValue::Set(expense.description.clone()),
            occurred_at: ActiveValue::Set(expense.occurred_at),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            created_at: ActiveValue::Set(expense.created_at),
        }
    }
}

impl TryFrom<(Model, Vec<expense_participants::Model>)> for Expense {
    type Error = EngineError;

    fn try_from(
        (model, participants): (Model, Vec<expense_participants::Model>),
    ) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            group_id: model.group_id,
            paid_by: model.paid_by,
            amount: MoneyCents::new(model.amount_minor),
            description: model.description,
            occurred_at: model.occurred_at,
            created_by: model.created_by,
            created_at: model.created_at,
            participants: participants.into_iter().map(ExpenseShare::from).collect(),
        })
    }
}
