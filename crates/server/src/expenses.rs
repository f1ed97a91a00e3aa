//! Expense endpoints

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use ledger::{Expense, ExpenseFilter, NewExpense, UpdateExpense, users};

use crate::{
    ServerError, page_metadata, page_request, parse_amount,
    server::ServerState,
    types::expense::{ExpenseListQuery, ExpenseListResponse, ExpenseNew, ExpenseUpdate, ExpenseView},
};

fn expense_view(expense: Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        group_id: expense.group_id,
        amount: expense.amount.to_string(),
        description: expense.description,
        paid_by: expense.paid_by,
        created_at: expense.created_at,
        updated_at: expense.updated_at,
        version: expense.version,
    }
}

pub async fn create(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    Json(payload): Json<ExpenseNew>,
) -> Result<Response, ServerError> {
    let amount = parse_amount(&payload.amount)?;
    let expense = state
        .ledger
        .create_expense(
            group_id,
            user.id,
            NewExpense {
                amount,
                description: payload.description,
            },
        )
        .await?;

    let location = format!("/v1/groups/{group_id}/expenses/{}", expense.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(expense_view(expense)),
    )
        .into_response())
}

pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(i64, i64)>,
) -> Result<Json<ExpenseView>, ServerError> {
    let expense = state.ledger.expense(group_id, expense_id, user.id).await?;

    Ok(Json(expense_view(expense)))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(i64, i64)>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let amount = payload.amount.as_deref().map(parse_amount).transpose()?;
    let expense = state
        .ledger
        .update_expense(
            group_id,
            expense_id,
            user.id,
            UpdateExpense {
                amount,
                description: payload.description,
                version: payload.version,
            },
        )
        .await?;

    Ok(Json(expense_view(expense)))
}

pub async fn delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ServerError> {
    state
        .ledger
        .delete_expense(group_id, expense_id, user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    Query(query): Query<ExpenseListQuery>,
) -> Result<Json<ExpenseListResponse>, ServerError> {
    let filter = ExpenseFilter {
        description: query.description,
        paid_by: query.paid_by,
    };
    let page = page_request(query.page, query.page_size, query.sort);
    let (expenses, meta) = state
        .ledger
        .list_expenses(group_id, user.id, filter, page)
        .await?;

    Ok(Json(ExpenseListResponse {
        expenses: expenses.into_iter().map(expense_view).collect(),
        metadata: page_metadata(meta),
    }))
}
