use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{balances, expenses, groups, participants, settlements};
use ledger::{Ledger, users};

#[derive(Clone)]
pub struct ServerState {
    pub ledger: Arc<Ledger>,
    pub db: DatabaseConnection,
}

/// Resolves the acting user from Basic credentials.
///
/// The matching `users::Model` is stored as a request extension for the
/// handlers.
async fn auth(
    auth_header: Option<TypedHeader<Authorization<Basic>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(auth_header)) = auth_header else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user: Option<users::Model> = users::Entity::find()
        .filter(users::Column::Username.eq(auth_header.username()))
        .filter(users::Column::Password.eq(auth_header.password()))
        .one(&state.db)
        .await
        .map_err(|err| {
            tracing::error!("failed to load user: {err}");
            StatusCode::UNAUTHORIZED
        })?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

async fn healthcheck() -> &'static str {
    "ok"
}

/// Builds the `/v1` API.
pub fn router(ledger: Ledger, db: DatabaseConnection) -> Router {
    let state = ServerState {
        ledger: Arc::new(ledger),
        db,
    };

    let protected = Router::new()
        .route("/groups", post(groups::create))
        .route(
            "/groups/{group_id}/members",
            get(groups::members).post(groups::add_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}",
            axum::routing::delete(groups::remove_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}/reinstate",
            post(groups::reinstate_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}/history",
            get(groups::history),
        )
        .route(
            "/groups/{group_id}/members/{user_id}/balance",
            get(balances::member),
        )
        .route("/groups/{group_id}/balances", get(balances::group))
        .route(
            "/groups/{group_id}/expenses",
            get(expenses::list).post(expenses::create),
        )
        .route(
            "/groups/{group_id}/expenses/{expense_id}",
            get(expenses::get)
                .patch(expenses::update)
                .delete(expenses::delete),
        )
        .route(
            "/groups/{group_id}/expenses/{expense_id}/participants",
            get(participants::list).post(participants::add),
        )
        .route(
            "/groups/{group_id}/expenses/{expense_id}/participants/{participant_id}",
            get(participants::get)
                .patch(participants::update)
                .delete(participants::delete),
        )
        .route(
            "/groups/{group_id}/settlements",
            get(settlements::list).post(settlements::create),
        )
        .route(
            "/groups/{group_id}/settlements/{settlement_id}",
            get(settlements::get).delete(settlements::delete),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    let v1 = Router::new()
        .route("/healthcheck", get(healthcheck))
        .merge(protected);

    Router::new().nest("/v1", v1).with_state(state)
}

pub async fn run_with_listener(
    ledger: Ledger,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(ledger, db)).await
}
