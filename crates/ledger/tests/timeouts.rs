mod common;

use std::time::Duration;

use common::{add_user, expense};
use ledger::{ExpenseFilter, Ledger, LedgerError, PageRequest};
use migration::MigratorTrait;
use sea_orm::{ConnectionTrait, Database, TransactionTrait};

#[tokio::test]
async fn blocked_write_times_out_as_transient_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("ledger.db").display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder().database(db.clone()).build().await.unwrap();
    let alice = add_user(&db, "alice").await;
    let group = ledger.create_group("Trip", alice).await.unwrap();

    // A second connection takes the write lock and keeps it.
    let other = Database::connect(&url).await.unwrap();
    let lock = other.begin().await.unwrap();
    lock.execute_unprepared("INSERT INTO users (username, password) VALUES ('lock', 'x')")
        .await
        .unwrap();

    let hurried = Ledger::builder()
        .database(db.clone())
        .op_timeout(Duration::from_millis(200))
        .build()
        .await
        .unwrap();
    let err = hurried
        .create_expense(group.id, alice, expense("10.00", "Taxi"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Transient(_)), "got {err:?}");
    assert!(err.is_transient());

    lock.rollback().await.unwrap();

    let (rows, meta) = ledger
        .list_expenses(
            group.id,
            alice,
            ExpenseFilter::default(),
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(meta.total_records, 0);
}
