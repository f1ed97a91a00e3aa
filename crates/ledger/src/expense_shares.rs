//! Shares: the portion of an expense a single user owes.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::MoneyCents;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub id: i64,
    pub expense_id: i64,
    pub user_id: i64,
    pub amount_owed: MoneyCents,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_shares")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub expense_id: i64,
    pub user_id: i64,
    pub amount_owed_minor: i64,
    pub updated_at: DateTimeUtc,
    pub version: i32,
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

impl From<Model> for ExpenseShare {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            expense_id: model.expense_id,
            user_id: model.user_id,
            amount_owed: MoneyCents::new(model.amount_owed_minor),
            updated_at: model.updated_at,
            version: model.version,
        }
    }
}
