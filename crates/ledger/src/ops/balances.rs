use sea_orm::{DatabaseTransaction, JoinType, QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{
    ExpenseRow, GroupBalances, LedgerError, MoneyCents, ResultLedger, SettlementRow, ShareRow,
    expense_shares, expenses, reconcile, settlements,
};

use super::Ledger;

impl Ledger {
    /// Nets every expense, share and settlement of the group per user.
    ///
    /// Read-only: runs in one transaction and writes nothing, so calling it
    /// twice without intervening writes returns the same balances.
    pub async fn group_balances(
        &self,
        group_id: i64,
        acting_user: i64,
    ) -> ResultLedger<GroupBalances> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                ledger.reconcile_group(db_tx, group_id).await
            })
        })
        .await
    }

    /// Net balance of one user, who must have been a member at some point.
    pub async fn member_balance(
        &self,
        group_id: i64,
        user_id: i64,
        acting_user: i64,
    ) -> ResultLedger<MoneyCents> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                if !ledger.member_was_ever(db_tx, group_id, user_id).await? {
                    return Err(LedgerError::NotFound("member".to_string()));
                }
                let balances = ledger.reconcile_group(db_tx, group_id).await?;
                Ok(balances.get(user_id).unwrap_or(MoneyCents::ZERO))
            })
        })
        .await
    }

    async fn reconcile_group(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
    ) -> ResultLedger<GroupBalances> {
        let expense_rows: Vec<ExpenseRow> = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group_id))
            .order_by_asc(expenses::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|e| ExpenseRow {
                expense_id: e.id,
                paid_by: e.paid_by,
                amount: MoneyCents::new(e.amount_minor),
            })
            .collect();

        let share_rows: Vec<ShareRow> = expense_shares::Entity::find()
            .join(JoinType::InnerJoin, expense_shares::Relation::Expenses.def())
            .filter(expenses::Column::GroupId.eq(group_id))
            .order_by_asc(expense_shares::Column::ExpenseId)
            .order_by_asc(expense_shares::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|s| ShareRow {
                expense_id: s.expense_id,
                user_id: s.user_id,
                amount_owed: MoneyCents::new(s.amount_owed_minor),
            })
            .collect();

        let settlement_rows: Vec<SettlementRow> = settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(group_id))
            .order_by_asc(settlements::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|s| SettlementRow {
                payer_id: s.payer_id,
                payee_id: s.payee_id,
                amount: MoneyCents::new(s.amount_minor),
            })
            .collect();

        let cleared = expense_rows.iter().filter(|e| e.paid_by.is_none()).count()
            + settlement_rows
                .iter()
                .filter(|s| s.payer_id.is_none() || s.payee_id.is_none())
                .count();
        if cleared > 0 {
            tracing::warn!(
                group_id,
                cleared,
                "ledger rows reference deleted users, netting them as unattributed"
            );
        }

        let balances = reconcile(group_id, &expense_rows, &share_rows, &settlement_rows)?;
        tracing::debug!(
            group_id,
            expenses = expense_rows.len(),
            shares = share_rows.len(),
            settlements = settlement_rows.len(),
            "group reconciled"
        );
        Ok(balances)
    }
}
