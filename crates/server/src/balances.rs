//! Balance endpoints

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use ledger::users;

use crate::{
    ServerError,
    server::ServerState,
    types::balance::{BalanceView, BalancesResponse},
};

pub async fn group(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<Json<BalancesResponse>, ServerError> {
    let balances = state.ledger.group_balances(group_id, user.id).await?;

    Ok(Json(BalancesResponse {
        balances: balances
            .balances
            .into_iter()
            .map(|b| BalanceView {
                user_id: b.user_id,
                balance: b.net.to_string(),
            })
            .collect(),
        unattributed: balances.unattributed.to_string(),
    }))
}

pub async fn member(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<BalanceView>, ServerError> {
    let balance = state
        .ledger
        .member_balance(group_id, user_id, user.id)
        .await?;

    Ok(Json(BalanceView {
        user_id,
        balance: balance.to_string(),
    }))
}
