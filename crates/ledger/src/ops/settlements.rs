use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{
    LedgerError, MoneyCents, PageMetadata, PageRequest, ResultLedger, Settlement,
    paging::SortColumn, parse_sort, settlements,
};

use super::{Ledger, paginate, require_positive};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSettlement {
    pub payer_id: i64,
    pub payee_id: i64,
    pub amount: MoneyCents,
    /// Defaults to now.
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementSort {
    Id,
    Amount,
    SettledAt,
    PayerId,
    PayeeId,
}

impl SettlementSort {
    fn column(self) -> settlements::Column {
        match self {
            Self::Id => settlements::Column::Id,
            Self::Amount => settlements::Column::AmountMinor,
            Self::SettledAt => settlements::Column::SettledAt,
            Self::PayerId => settlements::Column::PayerId,
            Self::PayeeId => settlements::Column::PayeeId,
        }
    }
}

impl SortColumn for SettlementSort {
    const DEFAULT: Self = Self::SettledAt;

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "amount" => Some(Self::Amount),
            "settled_at" => Some(Self::SettledAt),
            "payer_id" => Some(Self::PayerId),
            "payee_id" => Some(Self::PayeeId),
            _ => None,
        }
    }
}

impl Ledger {
    /// Records that `payer_id` paid `payee_id` directly.
    ///
    /// Both parties must be active members at the time of recording.
    pub async fn create_settlement(
        &self,
        group_id: i64,
        acting_user: i64,
        new: NewSettlement,
    ) -> ResultLedger<Settlement> {
        require_positive(new.amount, "settlement amount")?;
        if new.payer_id == new.payee_id {
            return Err(LedgerError::invalid_input(
                "payee_id",
                "payer and payee must be different users",
            ));
        }
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                for (role, user_id) in [("payer", new.payer_id), ("payee", new.payee_id)] {
                    if !ledger.member_is_active(db_tx, group_id, user_id).await? {
                        return Err(LedgerError::Forbidden(format!(
                            "{role} {user_id} is not an active member of group {group_id}"
                        )));
                    }
                }

                let model = settlements::ActiveModel {
                    group_id: ActiveValue::Set(group_id),
                    payer_id: ActiveValue::Set(Some(new.payer_id)),
                    payee_id: ActiveValue::Set(Some(new.payee_id)),
                    amount_minor: ActiveValue::Set(new.amount.cents()),
                    settled_at: ActiveValue::Set(new.settled_at.unwrap_or_else(Utc::now)),
                    ..Default::default()
                }
                .insert(db_tx)
                .await
                .map_err(|err| LedgerError::from_store(err, "settlement"))?;
                tracing::debug!(group_id, settlement_id = model.id, "settlement recorded");
                Ok(Settlement::from(model))
            })
        })
        .await
    }

    pub async fn settlement(
        &self,
        group_id: i64,
        settlement_id: i64,
        acting_user: i64,
    ) -> ResultLedger<Settlement> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let model = ledger
                    .require_settlement_in_group(db_tx, group_id, settlement_id)
                    .await?;
                Ok(Settlement::from(model))
            })
        })
        .await
    }

    /// Settlements are immutable; a wrong one is deleted and recorded again.
    pub async fn delete_settlement(
        &self,
        group_id: i64,
        settlement_id: i64,
        acting_user: i64,
    ) -> ResultLedger<()> {
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let result = settlements::Entity::delete_many()
                    .filter(settlements::Column::Id.eq(settlement_id))
                    .filter(settlements::Column::GroupId.eq(group_id))
                    .exec(db_tx)
                    .await?;
                if result.rows_affected == 0 {
                    return Err(LedgerError::NotFound("settlement".to_string()));
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn list_settlements(
        &self,
        group_id: i64,
        acting_user: i64,
        page: PageRequest,
    ) -> ResultLedger<(Vec<Settlement>, PageMetadata)> {
        let (sort, direction) = parse_sort::<SettlementSort>(page.sort.as_deref())?;
        self.with_tx(|ledger, db_tx| {
            Box::pin(async move {
                ledger
                    .require_active_member(db_tx, group_id, acting_user)
                    .await?;
                let query = settlements::Entity::find()
                    .filter(settlements::Column::GroupId.eq(group_id))
                    .order_by(sort.column(), direction.into())
                    .order_by_asc(settlements::Column::Id);
                let (rows, meta) = paginate(db_tx, query, &page).await?;
                Ok((rows.into_iter().map(Settlement::from).collect(), meta))
            })
        })
        .await
    }
}
