#![allow(dead_code)]

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{Ledger, MoneyCents, NewExpense, ProposedShare, SharePolicy};
use migration::MigratorTrait;

pub async fn ledger_with_db(policy: SharePolicy) -> (Ledger, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let ledger = Ledger::builder()
        .database(db.clone())
        .share_policy(policy)
        .build()
        .await
        .unwrap();
    (ledger, db)
}

/// Inserts a user and returns its id.
pub async fn add_user(db: &DatabaseConnection, username: &str) -> i64 {
    let backend = db.get_database_backend();
    let result = db
        .execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password) VALUES (?, ?)",
            vec![username.into(), "password".into()],
        ))
        .await
        .unwrap();
    result.last_insert_id() as i64
}

pub fn cents(value: &str) -> MoneyCents {
    value.parse().unwrap()
}

pub fn share(user_id: i64, amount: &str) -> ProposedShare {
    ProposedShare {
        user_id,
        amount_owed: cents(amount),
    }
}

pub fn expense(amount: &str, description: &str) -> NewExpense {
    NewExpense {
        amount: cents(amount),
        description: description.to_string(),
    }
}

/// Three users sharing one group; `users[0]` created it.
pub struct Trio {
    pub ledger: Ledger,
    pub db: DatabaseConnection,
    pub group_id: i64,
    pub users: [i64; 3],
}

pub async fn trio(policy: SharePolicy) -> Trio {
    let (ledger, db) = ledger_with_db(policy).await;
    let u1 = add_user(&db, "alice").await;
    let u2 = add_user(&db, "bob").await;
    let u3 = add_user(&db, "carol").await;
    let group = ledger.create_group("Trip", u1).await.unwrap();
    ledger.add_member(group.id, u2, u1).await.unwrap();
    ledger.add_member(group.id, u3, u1).await.unwrap();
    Trio {
        ledger,
        db,
        group_id: group.id,
        users: [u1, u2, u3],
    }
}
