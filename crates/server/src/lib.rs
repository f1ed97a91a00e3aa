use axum::{Json, http::StatusCode, response::IntoResponse};
use ledger::{LedgerError, MoneyCents, PageRequest};

use serde::Serialize;
pub use server::{router, run_with_listener};

mod balances;
mod expenses;
mod groups;
mod participants;
mod server;
mod settlements;

pub mod types {
    pub mod group {
        pub use api_types::group::{
            GroupNew, GroupView, MemberAdd, MemberEventView, MemberHistoryResponse, MemberState,
            MemberView, MembersResponse,
        };
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseListQuery, ExpenseListResponse, ExpenseNew, ExpenseUpdate, ExpenseView,
        };
    }

    pub mod participant {
        pub use api_types::participant::{
            ParticipantBatchResponse, ParticipantFailure, ParticipantListResponse,
            ParticipantNew, ParticipantUpdate, ParticipantView,
        };
    }

    pub mod settlement {
        pub use api_types::settlement::{SettlementListResponse, SettlementNew, SettlementView};
    }

    pub mod balance {
        pub use api_types::balance::{BalanceView, BalancesResponse};
    }
}

pub enum ServerError {
    Ledger(LedgerError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::EditConflict(_)
        | LedgerError::DuplicateEntry(_)
        | LedgerError::InvalidState(_) => StatusCode::CONFLICT,
        LedgerError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LedgerError::ForeignKeyViolation(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::Overallocated(_)
        | LedgerError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_ledger_error(err: LedgerError) -> String {
    match err {
        LedgerError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        err if err.is_transient() => {
            tracing::warn!("{err}");
            "the server is busy, please retry".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Ledger(err) => {
                (status_for_ledger_error(&err), message_for_ledger_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

/// Parses a decimal amount from a request body.
fn parse_amount(value: &str) -> Result<MoneyCents, ServerError> {
    Ok(value.parse::<MoneyCents>()?)
}

fn page_request(page: Option<u64>, page_size: Option<u64>, sort: Option<String>) -> PageRequest {
    let defaults = PageRequest::default();
    PageRequest {
        page: page.unwrap_or(defaults.page),
        page_size: page_size.unwrap_or(defaults.page_size),
        sort,
    }
}

fn page_metadata(meta: ledger::PageMetadata) -> api_types::paging::PageMetadata {
    api_types::paging::PageMetadata {
        current_page: meta.current_page,
        page_size: meta.page_size,
        first_page: meta.first_page,
        last_page: meta.last_page,
        total_records: meta.total_records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: LedgerError) -> StatusCode {
        ServerError::from(err).into_response().status()
    }

    #[test]
    fn ledger_forbidden_maps_to_403() {
        assert_eq!(
            status_of(LedgerError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn ledger_not_found_maps_to_404() {
        assert_eq!(
            status_of(LedgerError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn ledger_conflicts_map_to_409() {
        assert_eq!(
            status_of(LedgerError::EditConflict("x".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LedgerError::InvalidState("x".to_string())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn ledger_validation_maps_to_422() {
        assert_eq!(
            status_of(LedgerError::Overallocated("x".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(LedgerError::InvalidInput {
                field: "sort".to_string(),
                message: "x".to_string(),
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn ledger_transient_maps_to_503() {
        assert_eq!(
            status_of(LedgerError::Transient("timeout".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn transient_errors_ask_the_client_to_retry() {
        use http_body_util::BodyExt;

        let res = ServerError::from(LedgerError::Transient("operation timed out".to_string()))
            .into_response();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "the server is busy, please retry");
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_query_params_use_defaults() {
        let page = page_request(None, Some(5), None);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 5);
    }
}
