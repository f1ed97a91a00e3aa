//! Group and membership endpoints

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use ledger::{GroupMember, MembershipState, users};

use crate::{
    ServerError,
    server::ServerState,
    types::group::{
        GroupNew, GroupView, MemberAdd, MemberEventView, MemberHistoryResponse, MemberState,
        MemberView, MembersResponse,
    },
};

fn member_view(member: GroupMember) -> MemberView {
    let (state, state_changed_at) = match member.state {
        MembershipState::Active { since } => (MemberState::Active, since),
        MembershipState::Left { at } => (MemberState::Left, at),
    };
    MemberView {
        user_id: member.user_id,
        joined_at: member.joined_at,
        state,
        state_changed_at,
    }
}

pub async fn create(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let group = state.ledger.create_group(&payload.name, user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(GroupView {
            id: group.id,
            name: group.name,
            created_by: group.created_by,
            created_at: group.created_at,
        }),
    ))
}

pub async fn members(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
) -> Result<Json<MembersResponse>, ServerError> {
    let members = state.ledger.members(group_id, user.id).await?;

    Ok(Json(MembersResponse {
        members: members.into_iter().map(member_view).collect(),
    }))
}

pub async fn add_member(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<i64>,
    Json(payload): Json<MemberAdd>,
) -> Result<(StatusCode, Json<MemberView>), ServerError> {
    let member = state
        .ledger
        .add_member(group_id, payload.user_id, user.id)
        .await?;

    Ok((StatusCode::CREATED, Json(member_view(member))))
}

pub async fn remove_member(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<MemberView>, ServerError> {
    let member = state
        .ledger
        .remove_member(group_id, user_id, user.id)
        .await?;

    Ok(Json(member_view(member)))
}

pub async fn reinstate_member(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<MemberView>, ServerError> {
    let member = state
        .ledger
        .reinstate_member(group_id, user_id, user.id)
        .await?;

    Ok(Json(member_view(member)))
}

pub async fn history(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> Result<Json<MemberHistoryResponse>, ServerError> {
    let events = state
        .ledger
        .member_history(group_id, user_id, user.id)
        .await?;

    Ok(Json(MemberHistoryResponse {
        events: events
            .into_iter()
            .map(|event| MemberEventView {
                kind: event.kind.as_str().to_string(),
                at: event.at,
            })
            .collect(),
    }))
}
