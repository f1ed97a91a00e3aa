//! Expense participant (share) endpoints

use api_types::PageQuery;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ledger::{ExpenseShare, MoneyCents, ProposedShare, ShareFailureReason, UpdateShare, users};

use crate::{
    ServerError, page_metadata, page_request, parse_amount,
    server::ServerState,
    types::participant::{
        ParticipantBatchResponse, ParticipantFailure, ParticipantListResponse, ParticipantNew,
        ParticipantUpdate, ParticipantView,
    },
};

fn participant_view(share: ExpenseShare) -> ParticipantView {
    ParticipantView {
        id: share.id,
        expense_id: share.expense_id,
        user_id: share.user_id,
        amount_owed: share.amount_owed.to_string(),
        updated_at: share.updated_at,
        version: share.version,
    }
}

fn reason_name(reason: ShareFailureReason) -> &'static str {
    match reason {
        ShareFailureReason::InvalidAmount => "invalid-amount",
        ShareFailureReason::InvalidUser => "invalid-user",
        ShareFailureReason::DuplicateEntry => "duplicate-entry",
    }
}

/// Adds a batch of participants.
///
/// Entries with an unreadable amount, non-members and invalid entries are
/// reported and skipped; the rest are inserted. An overallocated batch is
/// rejected as a whole.
pub async fn add(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(i64, i64)>,
    Json(payload): Json<Vec<ParticipantNew>>,
) -> Result<(StatusCode, Json<ParticipantBatchResponse>), ServerError> {
    let mut proposed = Vec::with_capacity(payload.len());
    let mut unparsed = Vec::new();
    for entry in &payload {
        match entry.amount_owed.parse::<MoneyCents>() {
            Ok(amount_owed) => proposed.push(ProposedShare {
                user_id: entry.user_id,
                amount_owed,
            }),
            Err(_) => unparsed.push(ParticipantFailure {
                user_id: entry.user_id,
                reason: reason_name(ShareFailureReason::InvalidAmount).to_string(),
            }),
        }
    }

    let report = state
        .ledger
        .add_shares(group_id, expense_id, user.id, proposed)
        .await?;

    let inserted = report.inserted_count();
    let status = if inserted > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ParticipantBatchResponse {
            inserted,
            new_records: report.inserted.into_iter().map(participant_view).collect(),
            membership_failures: report.membership_failures,
            validation_failures: unparsed
                .into_iter()
                .chain(
                    report
                        .validation_failures
                        .into_iter()
                        .map(|f| ParticipantFailure {
                            user_id: f.user_id,
                            reason: reason_name(f.reason).to_string(),
                        }),
                )
                .collect(),
        }),
    ))
}

pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id, participant_id)): Path<(i64, i64, i64)>,
) -> Result<Json<ParticipantView>, ServerError> {
    let share = state
        .ledger
        .share(group_id, expense_id, participant_id, user.id)
        .await?;

    Ok(Json(participant_view(share)))
}

pub async fn update(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id, participant_id)): Path<(i64, i64, i64)>,
    Json(payload): Json<ParticipantUpdate>,
) -> Result<Json<ParticipantView>, ServerError> {
    let amount_owed = parse_amount(&payload.amount_owed)?;
    let share = state
        .ledger
        .update_share(
            group_id,
            expense_id,
            participant_id,
            user.id,
            UpdateShare {
                amount_owed,
                version: payload.version,
            },
        )
        .await?;

    Ok(Json(participant_view(share)))
}

pub async fn delete(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id, participant_id)): Path<(i64, i64, i64)>,
) -> Result<StatusCode, ServerError> {
    state
        .ledger
        .delete_share(group_id, expense_id, participant_id, user.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, expense_id)): Path<(i64, i64)>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ParticipantListResponse>, ServerError> {
    let page = page_request(query.page, query.page_size, query.sort);
    let (shares, meta) = state
        .ledger
        .list_shares(group_id, expense_id, user.id, page)
        .await?;

    Ok(Json(ParticipantListResponse {
        participants: shares.into_iter().map(participant_view).collect(),
        metadata: page_metadata(meta),
    }))
}
