use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};

use crate::{
    Expense, LedgerError, MoneyCents, PageMetadata, PageRequest, ResultLedger, SharePolicy,
    expense_shares, expenses, paging::SortColumn, parse_sort,
};

use super::{Ledger, normalize_description, paginate, require_positive};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: MoneyCents,
    pub description: String,
}

/// Partial update guarded by the version the caller last read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateExpense {
    pub amount: Option<MoneyCents>,
    pub description: Option<String>,
    pub version: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    /// Substring match on the description.
    pub description: Option<String>,
    /// `None` or `Some(0)` disables the filter.
    pub paid_by: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpenseSort {
    Id,
    Amount,
    Description,
    PaidBy,
    UpdatedAt,
}

impl ExpenseSort {
    fn column(self) -> expenses::Column {
        match self {
            Self::Id => expenses::Column::Id,
            Self::Amount => expenses::Column::AmountMinor,
            Self::Description => expenses::Column::Description,
            Self::PaidBy => expenses::Column::PaidBy,
            Self::UpdatedAt => expenses::Column::UpdatedAt,
        }
    }
}

impl SortColumn for ExpenseSort {
    const DEFAULT: Self = Self::Id;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "amount" => Some(Self::Amount),
            "description" => Some(Self::Description),
            "paid_by" => Some(Self::PaidBy),
            "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }
}

impl Ledger {
    /// Records an expense paid by `acting_user`.
    pub async fn create_expense(
        &self,
        group_id: i64,
        acting_user: i64,
        new: NewExpense,
    ) -> ResultLedger<Expense> {
        require_positive(new.amount, "expense amount")?;
        let description = normalize_description(&new.description)?;
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                // A missing group is reported by the insert as a foreign key violation.
                if ledger.group_exists(db_tx, group_id).await? {
                    ledger
                        .require_active_member(db_tx, group_id, acting_user)
                        .await?;
                }
                let now = Utc::now();
                let model = expenses::ActiveModel {
                    group_id: ActiveValue::Set(group_id),
                    amount_minor: ActiveValue::Set(new.amount.cents()),
                    description: ActiveValue::Set(description),
                    paid_by: ActiveValue::Set(Some(acting_user)),
                    created_at: ActiveValue::Set(now),
                    updated_at: ActiveValue::Set(now),
                    version: ActiveValue::Set(1),
                    ..Default::default()
                }
                .insert(db_tx)
                .await
                .map_err(|err| LedgerError::from_store(err, "expense"))?;
                tracing::debug!(group_id, expense_id = model.id, "expense created");
                Ok(Expense::from(model))
            })
        })
        .await
    }

    pub async fn expense(
        &self,
        group_id: i64,
        expense_id: i64,
        acting_user: i64,
    ) -> ResultLedger<Expense> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let model = ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;
                Ok(Expense::from(model))
            })
        })
        .await
    }

    /// Applies `update` if `update.version` is still current.
    ///
    /// A stale version yields [`LedgerError::EditConflict`]. Under
    /// [`SharePolicy::Cumulative`] the amount cannot drop below the shares
    /// already recorded.
    pub async fn update_expense(
        &self,
        group_id: i64,
        expense_id: i64,
        acting_user: i64,
        update: UpdateExpense,
    ) -> ResultLedger<Expense> {
        if let Some(amount) = update.amount {
            require_positive(amount, "expense amount")?;
        }
        let description = update
            .description
            .as_deref()
            .map(normalize_description)
            .transpose()?;
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;

                if let Some(amount) = update.amount
                    && ledger.share_policy == SharePolicy::Cumulative
                {
                    let allocated = ledger.allocated_total(db_tx, expense_id, None).await?;
                    if amount < allocated {
                        return Err(LedgerError::Overallocated(format!(
                            "expense amount {amount} is below the {allocated} already shared"
                        )));
                    }
                }

                let mut query = expenses::Entity::update_many()
                    .col_expr(expenses::Column::UpdatedAt, Expr::value(Utc::now()))
                    .col_expr(
                        expenses::Column::Version,
                        Expr::col(expenses::Column::Version).add(1),
                    );
                if let Some(amount) = update.amount {
                    query = query.col_expr(expenses::Column::AmountMinor, Expr::value(amount.cents()));
                }
                if let Some(description) = description {
                    query = query.col_expr(expenses::Column::Description, Expr::value(description));
                }
                let result = query
                    .filter(expenses::Column::Id.eq(expense_id))
                    .filter(expenses::Column::GroupId.eq(group_id))
                    .filter(expenses::Column::Version.eq(update.version))
                    .exec(db_tx)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(LedgerError::EditConflict(format!(
                        "expense {expense_id} was modified, version {} is stale",
                        update.version
                    )));
                }

                let model = ledger
                    .require_expense_in_group(db_tx, group_id, expense_id)
                    .await?;
                Ok(Expense::from(model))
            })
        })
        .await
    }

    /// Deletes an expense together with its shares.
    pub async fn delete_expense(
        &self,
        group_id: i64,
        expense_id: i64,
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
                expense_shares::Entity::delete_many()
                    .filter(expense_shares::Column::ExpenseId.eq(expense_id))
                    .exec(db_tx)
                    .await?;
                let result = expenses::Entity::delete_many()
                    .filter(expenses::Column::Id.eq(expense_id))
                    .filter(expenses::Column::GroupId.eq(group_id))
                    .exec(db_tx)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(LedgerError::NotFound("expense".to_string()));
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn list_expenses(
        &self,
        group_id: i64,
        acting_user: i64,
        filter: ExpenseFilter,
        page: PageRequest,
    ) -> ResultLedger<(Vec<Expense>, PageMetadata)> {
        let (sort, direction) = parse_sort::<ExpenseSort>(page.sort.as_deref())?;
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let mut query =
                    expenses::Entity::find().filter(expenses::Column::GroupId.eq(group_id));
                if let Some(description) = filter
                    .description
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                {
                    query = query.filter(expenses::Column::Description.contains(description));
                }
                if let Some(paid_by) = filter.paid_by.filter(|id| *id != 0) {
                    query = query.filter(expenses::Column::PaidBy.eq(paid_by));
                }
                let query = query
                    .order_by(sort.column(), direction.into())
                    .order_by_asc(expenses::Column::Id);

                let (rows, meta) = paginate(db_tx, query, &page).await?;
                Ok((rows.into_iter().map(Expense::from).collect(), meta))
            })
        })
        .await
    }
}
