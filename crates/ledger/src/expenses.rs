//! Expenses: a single payment made on behalf of a group.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::MoneyCents;

/// An expense paid by one member and split into shares.
///
/// `paid_by` becomes `None` once the paying user is deleted; the amount still
/// counts towards the group totals. `version` is the optimistic concurrency
/// token: every successful update bumps it by one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub group_id: i64,
    pub amount: MoneyCents,
    pub description: String,
    pub paid_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    pub amount_minor: i64,
    pub description: String,
    pub paid_by: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub version: i32,
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
    #[sea_orm(has_many = "super::expense_shares::Entity")]
    Shares,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::expense_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shares.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Expense {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            group_id: model.group_id,
            amount: MoneyCents::new(model.amount_minor),
            description: model.description,
            paid_by: model.paid_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
            version: model.version,
        }
    }
}
