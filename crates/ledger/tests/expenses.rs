mod common;

use common::{cents, expense, share, trio};
use ledger::{
    ExpenseFilter, LedgerError, PageRequest, ShareFailure, ShareFailureReason, SharePolicy,
    UpdateExpense, UpdateShare,
};

#[tokio::test]
async fn create_expense_starts_at_version_one() {
    let t = trio(SharePolicy::Cumulative).await;
    let created = t
        .ledger
        .create_expense(t.group_id, t.users[0], expense("12.50", "  Coffee  "))
        .await
        .unwrap();
    assert_eq!(created.version, 1);
    assert_eq!(created.description, "Coffee");
    assert_eq!(created.paid_by, Some(t.users[0]));

    let fetched = t
        .ledger
        .expense(t.group_id, created.id, t.users[1])
        .await
        .unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_expense_validates_input() {
    let t = trio(SharePolicy::Cumulative).await;
    let u1 = t.users[0];

    let err = t
        .ledger
        .create_expense(t.group_id, u1, expense("0", "Nothing"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    let long = "x".repeat(501);
    let err = t
        .ledger
        .create_expense(t.group_id, u1, expense("1.00", &long))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "description"));

    let err = t
        .ledger
        .create_expense(t.group_id + 100, u1, expense("1.00", "Ghost group"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ForeignKeyViolation(_)));
}

#[tokio::test]
async fn stale_version_is_an_edit_conflict() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, _] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("40.00", "Tickets"))
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        t.ledger.update_expense(
            t.group_id,
            created.id,
            u1,
            UpdateExpense {
                amount: Some(cents("45.00")),
                description: None,
                version: created.version,
            },
        ),
        t.ledger.update_expense(
            t.group_id,
            created.id,
            u2,
            UpdateExpense {
                amount: None,
                description: Some("Concert tickets".to_string()),
                version: created.version,
            },
        ),
    );

    let (winner, loser) = match (first, second) {
        (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
        other => panic!("expected exactly one update to succeed, got {other:?}"),
    };
    assert_eq!(winner.version, 2);
    assert!(matches!(loser, LedgerError::EditConflict(_)));

    let current = t.ledger.expense(t.group_id, created.id, u1).await.unwrap();
    assert_eq!(current, winner);
}

#[tokio::test]
async fn expense_from_another_group_is_not_found() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, ..] = t.users;
    let other = t.ledger.create_group("Other", u1).await.unwrap();
    let created = t
        .ledger
        .create_expense(other.id, u1, expense("5.00", "Snacks"))
        .await
        .unwrap();

    let err = t
        .ledger
        .expense(t.group_id, created.id, u1)
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("expense".to_string()));
    let err = t
        .ledger
        .delete_expense(t.group_id, created.id, u1)
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("expense".to_string()));
}

#[tokio::test]
async fn delete_expense_drops_its_shares() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, _] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("10.00", "Bread"))
        .await
        .unwrap();
    t.ledger
        .add_shares(t.group_id, created.id, u1, vec![share(u2, "10.00")])
        .await
        .unwrap();

    t.ledger
        .delete_expense(t.group_id, created.id, u1)
        .await
        .unwrap();

    let balances = t.ledger.group_balances(t.group_id, u1).await.unwrap();
    assert!(balances.balances.is_empty());
}

#[tokio::test]
async fn list_expenses_filters_sorts_and_pages() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, _] = t.users;
    for (payer, amount, description) in [
        (u1, "10.00", "Pizza night"),
        (u2, "30.00", "Pizza lunch"),
        (u1, "20.00", "Museum"),
    ] {
        t.ledger
            .create_expense(t.group_id, payer, expense(amount, description))
            .await
            .unwrap();
    }

    let (rows, meta) = t
        .ledger
        .list_expenses(
            t.group_id,
            u1,
            ExpenseFilter {
                description: Some("Pizza".to_string()),
                paid_by: Some(0),
            },
            PageRequest {
                sort: Some("-amount".to_string()),
                ..PageRequest::default()
            },
        )
        .await
        .unwrap();
    let amounts: Vec<_> = rows.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![cents("30.00"), cents("10.00")]);
    assert_eq!(meta.total_records, 2);
    assert_eq!(meta.last_page, 1);

    let (rows, meta) = t
        .ledger
        .list_expenses(
            t.group_id,
            u1,
            ExpenseFilter {
                description: None,
                paid_by: Some(u1),
            },
            PageRequest {
                page: 2,
                page_size: 1,
                sort: Some("amount".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].description, "Museum");
    assert_eq!(meta.current_page, 2);
    assert_eq!(meta.last_page, 2);

    let err = t
        .ledger
        .list_expenses(
            t.group_id,
            u1,
            ExpenseFilter::default(),
            PageRequest {
                sort: Some("password".to_string()),
                ..PageRequest::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "sort"));
}

#[tokio::test]
async fn overallocated_batch_inserts_nothing() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, u3] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("100.00", "Hotel"))
        .await
        .unwrap();

    let err = t
        .ledger
        .add_shares(
            t.group_id,
            created.id,
            u1,
            vec![share(u2, "50.00"), share(u3, "50.01")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Overallocated(_)));

    let (rows, meta) = t
        .ledger
        .list_shares(t.group_id, created.id, u1, PageRequest::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(meta.total_records, 0);
}

#[tokio::test]
async fn non_members_are_reported_and_skipped() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, _] = t.users;
    let outsider = common::add_user(&t.db, "mallory").await;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("60.00", "Boat"))
        .await
        .unwrap();

    let report = t
        .ledger
        .add_shares(
            t.group_id,
            created.id,
            u1,
            vec![share(u2, "20.00"), share(outsider, "20.00")],
        )
        .await
        .unwrap();
    assert_eq!(report.inserted_count(), 1);
    assert_eq!(report.inserted[0].user_id, u2);
    assert_eq!(report.membership_failures, vec![outsider]);
    assert!(report.validation_failures.is_empty());

    let balances = t.ledger.group_balances(t.group_id, u1).await.unwrap();
    assert_eq!(balances.get(u2), Some(cents("20.00")));
    assert_eq!(balances.get(outsider), None);
}

#[tokio::test]
async fn bad_entries_do_not_abort_the_batch() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, u3] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("60.00", "Fuel"))
        .await
        .unwrap();

    let report = t
        .ledger
        .add_shares(
            t.group_id,
            created.id,
            u1,
            vec![share(u2, "10.00"), share(u3, "-1.00"), share(u2, "5.00")],
        )
        .await
        .unwrap();
    assert_eq!(report.inserted_count(), 1);
    assert_eq!(
        report.validation_failures,
        vec![
            ShareFailure {
                user_id: u3,
                reason: ShareFailureReason::InvalidAmount,
            },
            ShareFailure {
                user_id: u2,
                reason: ShareFailureReason::DuplicateEntry,
            },
        ]
    );
}

#[tokio::test]
async fn cumulative_policy_counts_persisted_shares() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, u3] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("100.00", "Cabin"))
        .await
        .unwrap();
    t.ledger
        .add_shares(t.group_id, created.id, u1, vec![share(u2, "60.00")])
        .await
        .unwrap();

    let err = t
        .ledger
        .add_shares(t.group_id, created.id, u1, vec![share(u3, "60.00")])
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Overallocated(_)));

    let err = t
        .ledger
        .update_expense(
            t.group_id,
            created.id,
            u1,
            UpdateExpense {
                amount: Some(cents("50.00")),
                description: None,
                version: created.version,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Overallocated(_)));
}

#[tokio::test]
async fn per_batch_policy_checks_each_batch_alone() {
    let t = trio(SharePolicy::PerBatch).await;
    let [u1, u2, u3] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("100.00", "Cabin"))
        .await
        .unwrap();
    t.ledger
        .add_shares(t.group_id, created.id, u1, vec![share(u2, "60.00")])
        .await
        .unwrap();
    let report = t
        .ledger
        .add_shares(t.group_id, created.id, u1, vec![share(u3, "60.00")])
        .await
        .unwrap();
    assert_eq!(report.inserted_count(), 1);

    let balances = t.ledger.group_balances(t.group_id, u1).await.unwrap();
    assert!(balances.total().is_zero());
    assert_eq!(balances.get(u1), Some(cents("-120.00")));
}

#[tokio::test]
async fn share_updates_are_versioned_and_capped() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, u3] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("90.00", "Groceries"))
        .await
        .unwrap();
    let report = t
        .ledger
        .add_shares(
            t.group_id,
            created.id,
            u1,
            vec![share(u2, "30.00"), share(u3, "30.00")],
        )
        .await
        .unwrap();
    let bob = report.inserted[0].clone();

    let updated = t
        .ledger
        .update_share(
            t.group_id,
            created.id,
            bob.id,
            u1,
            UpdateShare {
                amount_owed: cents("60.00"),
                version: bob.version,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.amount_owed, cents("60.00"));

    let err = t
        .ledger
        .update_share(
            t.group_id,
            created.id,
            bob.id,
            u1,
            UpdateShare {
                amount_owed: cents("10.00"),
                version: bob.version,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::EditConflict(_)));

    let err = t
        .ledger
        .update_share(
            t.group_id,
            created.id,
            bob.id,
            u1,
            UpdateShare {
                amount_owed: cents("60.01"),
                version: updated.version,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Overallocated(_)));
}

#[tokio::test]
async fn share_must_belong_to_the_claimed_expense() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, _] = t.users;
    let first = t
        .ledger
        .create_expense(t.group_id, u1, expense("10.00", "One"))
        .await
        .unwrap();
    let second = t
        .ledger
        .create_expense(t.group_id, u1, expense("10.00", "Two"))
        .await
        .unwrap();
    let report = t
        .ledger
        .add_shares(t.group_id, first.id, u1, vec![share(u2, "5.00")])
        .await
        .unwrap();
    let share_id = report.inserted[0].id;

    let err = t
        .ledger
        .share(t.group_id, second.id, share_id, u1)
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("participant".to_string()));

    let fetched = t
        .ledger
        .share(t.group_id, first.id, share_id, u1)
        .await
        .unwrap();
    assert_eq!(fetched.user_id, u2);
}

#[tokio::test]
async fn departed_participant_shares_are_frozen() {
    let t = trio(SharePolicy::Cumulative).await;
    let [u1, u2, _] = t.users;
    let created = t
        .ledger
        .create_expense(t.group_id, u1, expense("10.00", "Parking"))
        .await
        .unwrap();
    let report = t
        .ledger
        .add_shares(t.group_id, created.id, u1, vec![share(u2, "5.00")])
        .await
        .unwrap();
    let share_id = report.inserted[0].id;
    t.ledger.remove_member(t.group_id, u2, u1).await.unwrap();

    let err = t
        .ledger
        .delete_share(t.group_id, created.id, share_id, u1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));

    t.ledger.reinstate_member(t.group_id, u2, u1).await.unwrap();
    t.ledger
        .delete_share(t.group_id, created.id, share_id, u1)
        .await
        .unwrap();
}
