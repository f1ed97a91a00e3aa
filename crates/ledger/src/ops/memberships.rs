use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr,
};

use crate::{
    Group, GroupMember, LedgerError, MembershipEvent, MembershipEventKind, MembershipState,
    ResultLedger, group_member_events, group_members, groups,
};

use super::{Ledger, normalize_required_name};

impl Ledger {
    /// Creates a group and joins `created_by` as its first active member.
    pub async fn create_group(&self, name: &str, created_by: i64) -> ResultLedger<Group> {
        let name = normalize_required_name(name, "name")?;
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger.require_user_exists(db_tx, created_by).await?;
                let now = Utc::now();
                let group = groups::ActiveModel {
                    name: ActiveValue::Set(name),
                    created_by: ActiveValue::Set(Some(created_by)),
                    created_at: ActiveValue::Set(now),
                    ..Default::default()
                }
                .insert(db_tx)
                .await
                .map_err(|err| LedgerError::from_store(err, "group"))?;

                ledger.join(db_tx, group.id, created_by).await?;
                tracing::info!(group_id = group.id, created_by, "group created");
                Ok(Group::from(group))
            })
        })
        .await
    }

    /// Joins `user_id` to the group. Returning members go through
    /// [`Ledger::reinstate_member`].
    pub async fn add_member(
        &self,
        group_id: i64,
        user_id: i64,
        acting_user: i64,
    ) -> ResultLedger<GroupMember> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                ledger.require_user_exists(db_tx, user_id).await?;
                if ledger.find_member(db_tx, group_id, user_id).await?.is_some() {
                    return Err(LedgerError::DuplicateEntry(format!(
                        "user {user_id} already has a membership in group {group_id}"
                    )));
                }
                let member = ledger.join(db_tx, group_id, user_id).await?;
                GroupMember::try_from(member)
            })
        })
        .await
    }

    async fn join(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: i64,
    ) -> ResultLedger<group_members::Model> {
        let now = Utc::now();
        let state = MembershipState::Active { since: now };
        let member = group_members::ActiveModel {
            group_id: ActiveValue::Set(group_id),
            user_id: ActiveValue::Set(user_id),
            joined_at: ActiveValue::Set(now),
            state: ActiveValue::Set(state.as_str().to_string()),
            state_changed_at: ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(|err| LedgerError::from_store(err, "membership"))?;

        group_member_events::ActiveModel::record(member.id, MembershipEventKind::Joined, now)
            .insert(db)
            .await?;
        Ok(member)
    }

    /// Answers whether `user_id` currently belongs to the group.
    pub async fn is_active_member(&self, user_id: i64, group_id: i64) -> ResultLedger<bool> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move { ledger.member_is_active(db_tx, group_id, user_id).await })
        })
        .await
    }

    /// Answers whether `user_id` ever joined the group, whatever its state now.
    pub async fn was_ever_member(&self, group_id: i64, user_id: i64) -> ResultLedger<bool> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move { ledger.member_was_ever(db_tx, group_id, user_id).await })
        })
        .await
    }

    /// Soft-removes a member (`Active -> Left`). Their ledger rows stay.
    pub async fn remove_member(
        &self,
        group_id: i64,
        user_id: i64,
        acting_user: i64,
    ) -> ResultLedger<GroupMember> {
        self.transition(group_id, user_id, acting_user, MembershipEventKind::Left)
            .await
    }

    /// Reinstates a member who left (`Left -> Active`).
    pub async fn reinstate_member(
        &self,
        group_id: i64,
        user_id: i64,
        acting_user: i64,
    ) -> ResultLedger<GroupMember> {
        self.transition(group_id, user_id, acting_user, MembershipEventKind::Rejoined)
            .await
    }

    async fn transition(
        &self,
        group_id: i64,
        user_id: i64,
        acting_user: i64,
        kind: MembershipEventKind,
    ) -> ResultLedger<GroupMember> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let model = ledger
                    .find_member(db_tx, group_id, user_id)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound("member".to_string()))?;
                let member = GroupMember::try_from(model)?;

                let now = Utc::now();
                let next = match kind {
                    MembershipEventKind::Left => member.state.leave(now)?,
                    MembershipEventKind::Rejoined => member.state.rejoin(now)?,
                    MembershipEventKind::Joined => {
                        return Err(LedgerError::InvalidState(
                            "join is not a transition".to_string(),
                        ));
                    }
                };

                let updated = group_members::Entity::update_many()
                    .col_expr(group_members::Column::State, Expr::value(next.as_str()))
                    .col_expr(group_members::Column::StateChangedAt, Expr::value(now))
                    .filter(group_members::Column::Id.eq(member.id))
                    .filter(group_members::Column::State.eq(member.state.as_str()))
                    .exec(db_tx)
                    .await?;
                if updated.rows_affected == 0 {
                    return Err(LedgerError::InvalidState(
                        "membership changed concurrently".to_string(),
                    ));
                }

                group_member_events::ActiveModel::record(member.id, kind, now)
                    .insert(db_tx)
                    .await?;
                tracing::info!(
                    group_id,
                    user_id,
                    acting_user,
                    event = kind.as_str(),
                    "membership changed"
                );

                Ok(GroupMember {
                    state: next,
                    ..member
                })
            })
        })
        .await
    }

    /// Lists every membership of the group, departed members included.
    pub async fn members(&self, group_id: i64, acting_user: i64) -> ResultLedger<Vec<GroupMember>> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                group_members::Entity::find()
                    .filter(group_members::Column::GroupId.eq(group_id))
                    .order_by_asc(group_members::Column::UserId)
                    .all(db_tx)
                    .await?
                    .into_iter()
                    .map(GroupMember::try_from)
                    .collect()
            })
        })
        .await
    }

    /// Join/leave trail of one member, oldest first.
    pub async fn member_history(
        &self,
        group_id: i64,
        user_id: i64,
        acting_user: i64,
    ) -> ResultLedger<Vec<MembershipEvent>> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let member = ledger
                    .find_member(db_tx, group_id, user_id)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound("member".to_string()))?;
                group_member_events::Entity::find()
                    .filter(group_member_events::Column::MemberId.eq(member.id))
                    .order_by_asc(group_member_events::Column::Id)
                    .all(db_tx)
                    .await?
                    .into_iter()
                    .map(MembershipEvent::try_from)
                    .collect()
            })
        })
        .await
    }
}
