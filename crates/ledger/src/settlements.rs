//! Settlements: direct payments between two members.
//!
//! Settlements are immutable once recorded. A mistaken settlement is deleted
//! and recorded again.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::MoneyCents;

/// `payer_id` paid `amount` to `payee_id`.
///
/// Either side becomes `None` when that user is deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: i64,
    pub group_id: i64,
    pub payer_id: Option<i64>,
    pub payee_id: Option<i64>,
    pub amount: MoneyCents,
    pub settled_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    pub payer_id: Option<i64>,
    pub payee_id: Option<i64>,
    pub amount_minor: i64,
    pub settled_at: DateTimeUtc,
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

impl From<Model> for Settlement {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            group_id: model.group_id,
            payer_id: model.payer_id,
            payee_id: model.payee_id,
            amount: MoneyCents::new(model.amount_minor),
            settled_at: model.settled_at,
        }
    }
}
