use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use crate::{
    ExpenseShare, LedgerError, MoneyCents, PageMetadata, PageRequest, ProposedShare,
    ResultLedger, ShareBatchReport, ShareFailure, ShareFailureReason, SharePolicy,
    expense_shares, paging::SortColumn, parse_sort,
    validator::{check_allocation, validate_shares},
};

use super::{Ledger, paginate};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateShare {
    pub amount_owed: MoneyCents,
    pub version: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareSort {
    Id,
    AmountOwed,
    UserId,
}

impl ShareSort {
    fn column(self) -> expense_shares::Column {
        match self {
            Self::Id => expense_shares::Column::Id,
            Self::AmountOwed => expense_shares::Column::AmountOwedMinor,
            Self::UserId => expense_shares::Column::UserId,
        }
    }
}

impl SortColumn for ShareSort {
    const DEFAULT: Self = Self::Id;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "amount_owed" => Some(Self::AmountOwed),
            "user_id" => Some(Self::UserId),
            _ => None,
        }
    }
}

impl Ledger {
    /// Sum of the shares recorded on an expense, optionally leaving one out.
    pub(super) async fn allocated_total(
        &self,
        db: &DatabaseTransaction,
        expense_id: i64,
        excluding: Option<i64>,
    ) -> ResultLedger<MoneyCents> {
        let mut query =
            expense_shares::Entity::find().filter(expense_shares::Column::ExpenseId.eq(expense_id));
        if let Some(share_id) = excluding {
            query = query.filter(expense_shares::Column::Id.ne(share_id));
        }
        let rows = query.all(db).await?;
        MoneyCents::checked_sum(rows.iter().map(|s| MoneyCents::new(s.amount_owed_minor)))
            .ok_or_else(|| LedgerError::InvalidAmount("share total overflow".to_string()))
    }

    async fn require_share_in_expense(
        &self,
        db: &DatabaseTransaction,
        expense_id: i64,
        share_id: i64,
    ) -> ResultLedger<expense_shares::Model> {
        expense_shares::Entity::find_by_id(share_id)
            .filter(expense_shares::Column::ExpenseId.eq(expense_id))
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound("participant".to_string()))
    }

    /// Splits an expense among members.
    ///
    /// An overallocated batch is rejected as a whole. Otherwise each entry is
    /// handled on its own: non-members and invalid entries are reported in the
    /// returned [`ShareBatchReport`] while the rest are inserted.
    pub async fn add_shares(
        &self,
        group_id: i64,
        expense_id: i64,
        acting_user: i64,
        proposed: Vec<ProposedShare>,
    ) -> ResultLedger<ShareBatchReport> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let expense = ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;

                let persisted = match ledger.share_policy {
                    SharePolicy::Cumulative => {
                        ledger.allocated_total(db_tx, expense_id, None).await?
                    }
                    SharePolicy::PerBatch => MoneyCents::ZERO,
                };
                let available = ledger
                    .share_policy
                    .available(MoneyCents::new(expense.amount_minor), persisted);
                check_allocation(available, &proposed)?;

                let mut report = ShareBatchReport::default();
                for share in proposed {
                    if !ledger
                        .member_is_active(db_tx, group_id, share.user_id)
                        .await?
                    {
                        report.membership_failures.push(share.user_id);
                        continue;
                    }
                    match ledger.insert_share(db_tx, expense_id, share).await? {
                        Ok(inserted) => report.inserted.push(inserted),
                        Err(reason) => report.validation_failures.push(ShareFailure {
                            user_id: share.user_id,
                            reason,
                        }),
                    }
                }
                tracing::debug!(
                    group_id,
                    expense_id,
                    inserted = report.inserted.len(),
                    membership_failures = report.membership_failures.len(),
                    validation_failures = report.validation_failures.len(),
                    "participants added"
                );
                Ok(report)
            })
        })
        .await
    }

    /// Inserts one share; entry-level problems come back as the inner `Err`.
    async fn insert_share(
        &self,
        db: &DatabaseTransaction,
        expense_id: i64,
        share: ProposedShare,
    ) -> ResultLedger<Result<ExpenseShare, ShareFailureReason>> {
        if !share.amount_owed.is_positive() {
            return Ok(Err(ShareFailureReason::InvalidAmount));
        }
        let existing = expense_shares::Entity::find()
            .filter(expense_shares::Column::ExpenseId.eq(expense_id))
            .filter(expense_shares::Column::UserId.eq(share.user_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Ok(Err(ShareFailureReason::DuplicateEntry));
        }

        let inserted = expense_shares::ActiveModel {
            expense_id: ActiveValue::Set(expense_id),
            user_id: ActiveValue::Set(share.user_id),
            amount_owed_minor: ActiveValue::Set(share.amount_owed.cents()),
            updated_at: ActiveValue::Set(Utc::now()),
            version: ActiveValue::Set(1),
            ..Default::default()
        }
        .insert(db)
        .await;
        match inserted {
            Ok(model) => Ok(Ok(ExpenseShare::from(model))),
            Err(err) => match LedgerError::from_store(err, "participant") {
                LedgerError::DuplicateEntry(_) => Ok(Err(ShareFailureReason::DuplicateEntry)),
                LedgerError::ForeignKeyViolation(_) => Ok(Err(ShareFailureReason::InvalidUser)),
                other => Err(other),
            },
        }
    }

    pub async fn share(
        &self,
        group_id: i64,
        expense_id: i64,
        share_id: i64,
        acting_user: i64,
    ) -> ResultLedger<ExpenseShare> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;
                let model = ledger
                    .require_share_in_expense(db_tx, expense_id, share_id)
                    .await?;
                Ok(ExpenseShare::from(model))
            })
        })
        .await
    }

    /// Changes the amount owed on a share, guarded by its version.
    pub async fn update_share(
        &self,
        group_id: i64,
        expense_id: i64,
        share_id: i64,
        acting_user: i64,
        update: UpdateShare,
    ) -> ResultLedger<ExpenseShare> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let expense = ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;
                let current = ledger
                    .require_share_in_expense(db_tx, expense_id, share_id)
                    .await?;
                ledger
                    .require_share_user_active(db_tx, group_id, current.user_id)
                    .await?;

                let persisted = match ledger.share_policy {
                    SharePolicy::Cumulative => {
                        ledger
                            .allocated_total(db_tx, expense_id, Some(share_id))
                            .await?
                    }
                    SharePolicy::PerBatch => MoneyCents::ZERO,
                };
                let available = ledger
                    .share_policy
                    .available(MoneyCents::new(expense.amount_minor), persisted);
                validate_shares(
                    available,
                    &[ProposedShare {
                        user_id: current.user_id,
                        amount_owed: update.amount_owed,
                    }],
                )?;

                let result = expense_shares::Entity::update_many()
                    .col_expr(
                        expense_shares::Column::AmountOwedMinor,
                        Expr::value(update.amount_owed.cents()),
                    )
                    .col_expr(expense_shares::Column::UpdatedAt, Expr::value(Utc::now()))
                    .col_expr(
                        expense_shares::Column::Version,
                        Expr::col(expense_shares::Column::Version).add(1),
                    )
                    .filter(expense_shares::Column::Id.eq(share_id))
                    .filter(expense_shares::Column::ExpenseId.eq(expense_id))
                    .filter(expense_shares::Column::Version.eq(update.version))
                    .exec(db_tx)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(LedgerError::EditConflict(format!(
                        "participant {share_id} was modified, version {} is stale",
                        update.version
                    )));
                }

                let model = ledger
                    .require_share_in_expense(db_tx, expense_id, share_id)
                    .await?;
                Ok(ExpenseShare::from(model))
            })
        })
        .await
    }

    pub async fn delete_share(
        &self,
        group_id: i64,
        expense_id: i64,
        share_id: i64,
        acting_user: i64,
    ) -> ResultLedger<()> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;
                let current = ledger
                    .require_share_in_expense(db_tx, expense_id, share_id)
                    .await?;
                ledger
                    .require_share_user_active(db_tx, group_id, current.user_id)
                    .await?;
                expense_shares::Entity::delete_by_id(share_id)
                    .exec(db_tx)
                    .await?;
                Ok(())
            })
        })
        .await
    }

    pub async fn list_shares(
        &self,
        group_id: i64,
        expense_id: i64,
        acting_user: i64,
        page: PageRequest,
    ) -> ResultLedger<(Vec<ExpenseShare>, PageMetadata)> {
        let (sort, direction) = parse_sort::<ShareSort>(page.sort.as_deref())?;
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;
                let query = expense_shares::Entity::find()
                    .filter(expense_shares::Column::ExpenseId.eq(expense_id))
                    .order_by(sort.column(), direction.into())
                    .order_by_asc(expense_shares::Column::Id);
                let (rows, meta) = paginate(db_tx, query, &page).await?;
                Ok((rows.into_iter().map(ExpenseShare::from).collect(), meta))
            })
        })
        .await
    }

    async fn require_share_user_active(
        &self,
        db: &DatabaseTransaction,
        group_id: i64,
        user_id: i64,
    ) -> ResultLedger<()> {
        if !self.member_is_active(db, group_id, user_id).await? {
            return Err(LedgerError::Forbidden(format!(
                "participant {user_id} is no longer an active member"
            )));
        }
        Ok(())
    }
}
