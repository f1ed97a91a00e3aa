//! Group membership and its lifecycle.
//!
//! A membership row is never deleted. Leaving a group moves the row from
//! [`MembershipState::Active`] to [`MembershipState::Left`]; reinstating moves
//! it back. Each transition is also appended to `group_member_events`, so the
//! full join/leave history stays available for ledger attribution.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{LedgerError, ResultLedger};

pub(crate) const STATE_ACTIVE: &str = "active";
pub(crate) const STATE_LEFT: &str = "left";

/// Lifecycle state of a membership, with the time it was entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MembershipState {
    Active { since: DateTime<Utc> },
    Left { at: DateTime<Utc> },
}

impl MembershipState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active { .. } => STATE_ACTIVE,
            Self::Left { .. } => STATE_LEFT,
        }
    }

    /// `Active -> Left`.
    pub fn leave(self, at: DateTime<Utc>) -> ResultLedger<Self> {
        match self {
            Self::Active { .. } => Ok(Self::Left { at }),
            Self::Left { .. } => Err(LedgerError::InvalidState(
                "member already left the group".to_string(),
            )),
        }
    }

    /// `Left -> Active`. Reinstating requires the member to have left first.
    pub fn rejoin(self, at: DateTime<Utc>) -> ResultLedger<Self> {
        match self {
            Self::Left { .. } => Ok(Self::Active { since: at }),
            Self::Active { .. } => Err(LedgerError::InvalidState(
                "member is already active".to_string(),
            )),
        }
    }

    fn from_parts(state: &str, changed_at: DateTime<Utc>) -> ResultLedger<Self> {
        match state {
            STATE_ACTIVE => Ok(Self::Active { since: changed_at }),
            STATE_LEFT => Ok(Self::Left { at: changed_at }),
            other => Err(LedgerError::InvalidState(format!(
                "invalid membership state: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub joined_at: DateTime<Utc>,
    pub state: MembershipState,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub joined_at: DateTimeUtc,
    pub state: String,
    pub state_changed_at: DateTimeUtc,
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
    #[sea_orm(has_many = "super::group_member_events::Entity")]
    Events,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::group_member_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for GroupMember {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            group_id: model.group_id,
            user_id: model.user_id,
            joined_at: model.joined_at,
            state: MembershipState::from_parts(&model.state, model.state_changed_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn leave_then_rejoin_round_trips() {
        let joined = MembershipState::Active { since: at(8) };
        let left = joined.leave(at(9)).unwrap();
        assert_eq!(left, MembershipState::Left { at: at(9) });
        assert!(!left.is_active());

        let back = left.rejoin(at(10)).unwrap();
        assert_eq!(back, MembershipState::Active { since: at(10) });
    }

    #[test]
    fn rejoin_requires_having_left() {
        let active = MembershipState::Active { since: at(8) };
        assert!(matches!(
            active.rejoin(at(9)),
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn leaving_twice_is_rejected() {
        let left = MembershipState::Left { at: at(8) };
        assert!(matches!(left.leave(at(9)), Err(LedgerError::InvalidState(_))));
    }

    #[test]
    fn unknown_stored_state_is_rejected() {
        assert!(MembershipState::from_parts("banned", at(8)).is_err());
        assert_eq!(
            MembershipState::from_parts(STATE_LEFT, at(8)).unwrap(),
            MembershipState::Left { at: at(8) }
        );
    }
}
