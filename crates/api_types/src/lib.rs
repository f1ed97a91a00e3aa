//! JSON bodies exchanged over the `/v1` HTTP API.
//!
//! Amounts are decimal strings with at most two fractional digits
//! (`"30.00"`). Balances follow one convention: positive means the user owes
//! the group, negative means the group owes the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod paging {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PageMetadata {
        pub current_page: u64,
        pub page_size: u64,
        pub first_page: u64,
        pub last_page: u64,
        pub total_records: u64,
    }
}

pub mod group {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: i64,
        pub name: String,
        pub created_by: Option<i64>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberAdd {
        pub user_id: i64,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MemberState {
        Active,
        Left,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub user_id: i64,
        pub joined_at: DateTime<Utc>,
        pub state: MemberState,
        /// When the member entered `state`.
        pub state_changed_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersResponse {
        pub members: Vec<MemberView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberEventView {
        /// `joined`, `left` or `rejoined`.
        pub kind: String,
        pub at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberHistoryResponse {
        pub events: Vec<MemberEventView>,
    }
}

pub mod expense {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub amount: String,
        pub description: String,
    }

    /// Partial update; `version` must match the stored one.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub amount: Option<String>,
        pub description: Option<String>,
        pub version: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: i64,
        pub group_id: i64,
        pub amount: String,
        pub description: String,
        pub paid_by: Option<i64>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
        pub version: i32,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseListQuery {
        pub description: Option<String>,
        pub paid_by: Option<i64>,
        pub page: Option<u64>,
        pub page_size: Option<u64>,
        pub sort: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
        pub metadata: paging::PageMetadata,
    }
}

pub mod participant {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantNew {
        pub user_id: i64,
        pub amount_owed: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantUpdate {
        pub amount_owed: String,
        pub version: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantView {
        pub id: i64,
        pub expense_id: i64,
        pub user_id: i64,
        pub amount_owed: String,
        pub updated_at: DateTime<Utc>,
        pub version: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantFailure {
        pub user_id: i64,
        /// `invalid-amount`, `invalid-user` or `duplicate-entry`.
        pub reason: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantBatchResponse {
        pub inserted: usize,
        pub new_records: Vec<ParticipantView>,
        pub membership_failures: Vec<i64>,
        pub validation_failures: Vec<ParticipantFailure>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ParticipantListResponse {
        pub participants: Vec<ParticipantView>,
        pub metadata: paging::PageMetadata,
    }
}

pub mod settlement {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementNew {
        pub payer_id: i64,
        pub payee_id: i64,
        pub amount: String,
        #[serde(default)]
        pub settled_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementView {
        pub id: i64,
        pub group_id: i64,
        pub payer_id: Option<i64>,
        pub payee_id: Option<i64>,
        pub amount: String,
        pub settled_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementListResponse {
        pub settlements: Vec<SettlementView>,
        pub metadata: paging::PageMetadata,
    }
}

pub mod balance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub user_id: i64,
        pub balance: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalancesResponse {
        pub balances: Vec<BalanceView>,
        /// Net of rows whose user was deleted.
        pub unattributed: String,
    }
}

/// Query string shared by list endpoints without extra filters.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub sort: Option<String>,
}
