//! Lookups shared by the ledger operations: group existence, the membership
//! oracle, and "row belongs to this group" guards.

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};

use crate::{
    LedgerError, ResultLedger, expenses, group_members, groups, settlements, users,
    group_members::STATE_ACTIVE,
};

use super::Ledger;

/// Generates a `require_*_in_group` lookup returning the model, or
/// `NotFound` when the row is missing or belongs to another group.
macro_rules! impl_row_in_group {
    ($require_fn:ident, $entity:ident, $err_msg:literal) => {
        pub(super) async fn $require_fn(
            &self,
            db: &DatabaseTransaction,
            group_id: i64,
            row_id: i64,
        ) -> ResultLedger<$entity::Model> {
            $entity::Entity::find_by_id(row_id)
                .filter($entity::Column::GroupId.eq(group_id))
                .one(db)
                .await?
                .ok_or_else(|| LedgerError::NotFound($err_msg.to_string()))
        }
    };
}

impl Ledger {
    impl_row_in_group!(require_expense_in_group, expenses, "expense");

    impl_row_in_group!(require_settlement_in_group, settlements, "settlement");

    pub(super) async fn group_exists(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
    ) -> ResultLedger<bool> {
        Ok(groups::Entity::find_by_id(group_id).one(db).await?.is_some())
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
    ) -> ResultLedger<groups::Model> {
        groups::Entity::find_by_id(group_id)
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound("group".to_string()))
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        user_id: i64,
    ) -> ResultLedger<()> {
        let exists = users::Entity::find_by_id(user_id).one(db).await?.is_some();
        if !exists {
            return Err(LedgerError::ForeignKeyViolation(format!(
                "user {user_id} does not exist"
            )));
        }
        Ok(())
    }

    pub(super) async fn find_member(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: i64,
    ) -> ResultLedger<Option<group_members::Model>> {
        group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id))
            .filter(group_members::Column::UserId.eq(user_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn member_is_active(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: i64,
    ) -> ResultLedger<bool> {
        Ok(self
            .find_member(db, group_id, user_id)
            .await?
            .is_some_and(|m| m.state == STATE_ACTIVE))
    }

    pub(super) async fn member_was_ever(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: i64,
    ) -> ResultLedger<bool> {
        Ok(self.find_member(db, group_id, user_id).await?.is_some())
    }

    /// The group must exist and `user_id` must be one of its active members.
    pub(super) async fn require_active_member(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: i64,
    ) -> ResultLedger<groups::Model> {
        let group = self.require_group(db, group_id).await?;
        if !self.member_is_active(db, group_id, user_id).await? {
            return Err(LedgerError::Forbidden(format!(
                "user {user_id} is not an active member of group {group_id}"
            )));
        }
        Ok(group)
    }
}
