//! A `Group` is a named collection of users sharing expenses.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: String, owner: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            owner: owner.to_string(),
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_memberships::Entity")]
    Memberships,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
    #[sea_orm(has_many = "super::settlements::Entity")]
    Settlements,
}

impl Related<super::group_memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl Related<super::settlements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settlements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Group> for ActiveModel {
    fn from(value: &Group) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            name: ActiveValue::Set(value.name.clone()),
            owner: ActiveValue::Set(value.owner.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl From<Model> for Group {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            owner: model.owner,
            created_at: model.created_at,
        }
    }
}
