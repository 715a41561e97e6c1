//! A `Settlement` is a recorded out-of-band payment between two members.
//!
//! It lowers the payer's debt and the receiver's credit by `amount`. Nothing
//! checks that a matching debt exists: over-payments simply move balances.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub group_id: String,
    pub from_user: String,
    pub to_user: String,
    pub amount: MoneyCents,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub from_user: String,
    pub to_user: String,
    pub amount_minor: i64,
    pub description: Option<String>,
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
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id.to_string()),
            group_id: ActiveValue::Set(settlement.group_id.clone()),
            from_user: ActiveValue::Set(settlement.from_user.clone()),
            to_user: ActiveValue::Set(settlement.to_user.clone()),
            amount_minor: ActiveValue::Set(settlement.amount.cents()),
            description: ActiveValue::Set(settlement.description.clone()),
            occurred_at: ActiveValue::Set(settlement.occurred_at),
            created_by: ActiveValue::Set(settlement.created_by.clone()),
            created_at: ActiveValue::Set(settlement.created_at),
        }
    }
}

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "settlement")?,
            group_id: model.group_id,
            from_user: model.from_user,
            to_user: model.to_user,
            amount: MoneyCents::new(model.amount_minor),
            description: model.description,
            occurred_at: model.occurred_at,
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
