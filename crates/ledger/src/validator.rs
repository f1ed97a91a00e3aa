//! Share validation.
//!
//! Pure checks over amounts: nothing here touches the store. Membership of the
//! proposed participants is resolved by the caller through the membership
//! helpers and reported next to the validation failures in a
//! [`ShareBatchReport`].

use serde::{Deserialize, Serialize};

use crate::{ExpenseShare, LedgerError, MoneyCents};

/// How much of an expense a new batch of shares may claim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharePolicy {
    /// Persisted shares plus the proposed ones must fit in the expense amount.
    #[default]
    Cumulative,
    /// Only the proposed batch is compared with the expense amount.
    PerBatch,
}

impl SharePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cumulative => "cumulative",
            Self::PerBatch => "per_batch",
        }
    }

    /// Room left for new shares given what is already persisted.
    pub fn available(self, expense_amount: MoneyCents, persisted: MoneyCents) -> MoneyCents {
        match self {
            Self::Cumulative => MoneyCents::new(
                expense_amount
                    .cents()
                    .saturating_sub(persisted.cents())
                    .max(0),
            ),
            Self::PerBatch => expense_amount,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedShare {
    pub user_id: i64,
    pub amount_owed: MoneyCents,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareRejection {
    InvalidAmount { user_id: i64 },
    Overallocated { proposed: MoneyCents, available: MoneyCents },
}

impl From<ShareRejection> for LedgerError {
    fn from(rejection: ShareRejection) -> Self {
        match rejection {
            ShareRejection::InvalidAmount { user_id } => LedgerError::InvalidAmount(format!(
                "amount owed by user {user_id} must be positive"
            )),
            ShareRejection::Overallocated {
                proposed,
                available,
            } => LedgerError::Overallocated(format!(
                "shares total {proposed} but only {available} is available"
            )),
        }
    }
}

/// Validates a set of shares against the room left on an expense.
///
/// Every amount must be positive and their sum must not exceed `available`.
pub fn validate_shares(
    available: MoneyCents,
    proposed: &[ProposedShare],
) -> Result<(), ShareRejection> {
    if let Some(bad) = proposed.iter().find(|s| !s.amount_owed.is_positive()) {
        return Err(ShareRejection::InvalidAmount {
            user_id: bad.user_id,
        });
    }
    check_allocation(available, proposed)
}

/// Batch-level check: the positive amounts of the batch must fit.
///
/// Non-positive entries are left to per-entry validation so that one bad
/// amount does not sink the batch. A sum that overflows is overallocated.
pub fn check_allocation(
    available: MoneyCents,
    proposed: &[ProposedShare],
) -> Result<(), ShareRejection> {
    let total = MoneyCents::checked_sum(
        proposed
            .iter()
            .map(|s| s.amount_owed)
            .filter(|amount| amount.is_positive()),
    );
    match total {
        Some(total) if total <= available => Ok(()),
        Some(total) => Err(ShareRejection::Overallocated {
            proposed: total,
            available,
        }),
        None => Err(ShareRejection::Overallocated {
            proposed: MoneyCents::new(i64::MAX),
            available,
        }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShareFailureReason {
    InvalidAmount,
    InvalidUser,
    DuplicateEntry,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareFailure {
    pub user_id: i64,
    pub reason: ShareFailureReason,
}

/// Outcome of a batch share insert.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareBatchReport {
    pub inserted: Vec<ExpenseShare>,
    pub membership_failures: Vec<i64>,
    pub validation_failures: Vec<ShareFailure>,
}

impl ShareBatchReport {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(user_id: i64, cents: i64) -> ProposedShare {
        ProposedShare {
            user_id,
            amount_owed: MoneyCents::new(cents),
        }
    }

    #[test]
    fn one_cent_over_is_overallocated() {
        let shares = [share(1, 50_00), share(2, 50_01)];
        assert_eq!(
            validate_shares(MoneyCents::new(100_00), &shares),
            Err(ShareRejection::Overallocated {
                proposed: MoneyCents::new(100_01),
                available: MoneyCents::new(100_00),
            })
        );
    }

    #[test]
    fn exact_fit_and_under_allocation_pass() {
        let amount = MoneyCents::new(100_00);
        assert!(validate_shares(amount, &[share(1, 50_00), share(2, 50_00)]).is_ok());
        assert!(validate_shares(amount, &[share(1, 10_00)]).is_ok());
        assert!(validate_shares(amount, &[]).is_ok());
    }

    #[test]
    fn non_positive_amount_names_the_user() {
        let shares = [share(1, 10_00), share(7, 0)];
        assert_eq!(
            validate_shares(MoneyCents::new(100_00), &shares),
            Err(ShareRejection::InvalidAmount { user_id: 7 })
        );
    }

    #[test]
    fn batch_check_ignores_bad_amounts() {
        let shares = [share(1, 100_00), share(2, -5_00)];
        assert!(check_allocation(MoneyCents::new(100_00), &shares).is_ok());
    }

    #[test]
    fn overflowing_batch_is_overallocated() {
        let shares = [share(1, i64::MAX), share(2, 1)];
        assert!(matches!(
            check_allocation(MoneyCents::new(100), &shares),
            Err(ShareRejection::Overallocated { .. })
        ));
    }

    #[test]
    fn policy_controls_available_room() {
        let amount = MoneyCents::new(100_00);
        let persisted = MoneyCents::new(70_00);
        assert_eq!(
            SharePolicy::Cumulative.available(amount, persisted),
            MoneyCents::new(30_00)
        );
        assert_eq!(SharePolicy::PerBatch.available(amount, persisted), amount);
        assert_eq!(
            SharePolicy::Cumulative.available(amount, MoneyCents::new(120_00)),
            MoneyCents::ZERO
        );
    }
}
