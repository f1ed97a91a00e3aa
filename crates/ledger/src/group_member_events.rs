//! Append-only trail of membership transitions.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, ResultLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipEventKind {
    Joined,
    Left,
    Rejoined,
}

impl MembershipEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::Left => "left",
            Self::Rejoined => "rejoined",
        }
    }
}

impl TryFrom<&str> for MembershipEventKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "joined" => Ok(Self::Joined),
            "left" => Ok(Self::Left),
            "rejoined" => Ok(Self::Rejoined),
            other => Err(LedgerError::InvalidState(format!(
                "invalid membership event: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipEvent {
    pub kind: MembershipEventKind,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "group_member_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub member_id: i64,
    pub kind: String,
    pub at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::group_members::Entity",
        from = "Column::MemberId",
        to = "super::group_members::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Members,
}

impl Related<super::group_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn record(member_id: i64, kind: MembershipEventKind, at: DateTime<Utc>) -> Self {
        Self {
            member_id: ActiveValue::Set(member_id),
            kind: ActiveValue::Set(kind.as_str().to_string()),
            at: ActiveValue::Set(at),
            ..Default::default()
        }
    }
}

impl TryFrom<Model> for MembershipEvent {
    type Error = LedgerError;

    fn try_from(model: Model) -> ResultLedger<Self> {
        Ok(Self {
            kind: MembershipEventKind::try_from(model.kind.as_str())?,
            at: model.at,
        })
    }
}
