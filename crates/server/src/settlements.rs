//! Settlement endpoints

use api_types::PageQuery;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ledger::{NewSettlement, Settlement, users};

use crate::{
    ServerError, page_metadata, page_request, parse_amount,
    server::ServerState,
    types::settlement::{SettlementListResponse, SettlementNew, SettlementView},
};

fn settlement_view(settlement: Settlement) -> SettlementView {
    SettlementView {
        id: settlement.id,
        group_id: settlement.group_id,
        payer_id: settlement.payer_id,
        payee_id: settlement.payee_id,
        amount: settlement.amount.to_string(),
        settled_at: settlement.settled_at,
    }
}

pub async fn create(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    Json(payload): Json<SettlementNew>,
) -> Result<(StatusCode, Json<SettlementView>), ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let settlement = state
        .ledger
        .create_settlement(
            group_id,
            user.id,
            NewSettlement {
                payer_id: payload.payer_id,
                payee_id: payload.payee_id,
                amount,
                settled_at: payload.settled_at,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(settlement_view(settlement))))
}

pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(i64, i64)>,
) -> Result<Json<SettlementView>, ServerError> {
    let settlement = state
        .ledger
        .settlement(group_id, settlement_id, user.id)
        .await?;

    Ok(Json(settlement_view(settlement)))
}

pub async fn delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, settlement_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ServerError> {
    state
        .ledger
        .delete_settlement(group_id, settlement_id, user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<SettlementListResponse>, ServerError> {
    let page = page_request(query.page, query.page_size, query.sort);
    let (settlements, meta) = state
        .ledger
        .list_settlements(group_id, user.id, page)
        .await?;

    Ok(Json(SettlementListResponse {
        settlements: settlements.into_iter().map(settlement_view).collect(),
        metadata: page_metadata(meta),
    }))
}
