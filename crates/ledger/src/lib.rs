//! Shared-expense ledger.
//!
//! Groups of users record expenses, split them into shares and settle debts
//! with direct payments. [`Ledger`] persists those rows and nets them into a
//! per-user balance on demand through [`reconcile`].

pub use error::LedgerError;
pub use expense_shares::ExpenseShare;
pub use expenses::Expense;
pub use group_member_events::{MembershipEvent, MembershipEventKind};
pub use group_members::{GroupMember, MembershipState};
pub use groups::Group;
pub use money::MoneyCents;
pub use ops::{
    DEFAULT_OP_TIMEOUT, ExpenseFilter, ExpenseSort, Ledger, LedgerBuilder, NewExpense,
    NewSettlement, SettlementSort, ShareSort, UpdateExpense, UpdateShare,
};
pub use paging::{PageMetadata, PageRequest, SortDirection, parse_sort};
pub use reconcile::{Balance, ExpenseRow, GroupBalances, SettlementRow, ShareRow, reconcile};
pub use settlements::Settlement;
pub use validator::{
    ProposedShare, ShareBatchReport, ShareFailure, ShareFailureReason, SharePolicy,
    ShareRejection, validate_shares,
};

mod error;
mod expense_shares;
mod expenses;
mod group_member_events;
mod group_members;
mod groups;
mod money;
mod ops;
pub mod paging;
mod reconcile;
mod settlements;
pub mod users;
mod validator;

pub type ResultLedger<T> = Result<T, LedgerError>;
