mod common;

use common::{add_user, ledger_with_db, trio};
use ledger::{LedgerError, MembershipEventKind, SharePolicy};

#[tokio::test]
async fn creator_joins_their_group() {
    let (ledger, db) = ledger_with_db(SharePolicy::default()).await;
    let alice = add_user(&db, "alice").await;

    let group = ledger.create_group("  Flat  ", alice).await.unwrap();
    assert_eq!(group.name, "Flat");
    assert!(ledger.is_active_member(alice, group.id).await.unwrap());

    let members = ledger.members(group.id, alice).await.unwrap();
    assert_eq!(members.len(), 1);
    assert!(members[0].state.is_active());
}

#[tokio::test]
async fn adding_members_checks_users_and_duplicates() {
    let t = trio(SharePolicy::default()).await;
    let [u1, u2, _] = t.users;

    let err = t.ledger.add_member(t.group_id, u2, u1).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateEntry(_)));

    let err = t
        .ledger
        .add_member(t.group_id, 9_999, u1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ForeignKeyViolation(_)));

    let outsider = add_user(&t.db, "mallory").await;
    let newcomer = add_user(&t.db, "dave").await;
    let err = t
        .ledger
        .add_member(t.group_id, newcomer, outsider)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
}

#[tokio::test]
async fn leave_and_rejoin_follow_the_state_machine() {
    let t = trio(SharePolicy::default()).await;
    let [u1, u2, _] = t.users;

    let left = t.ledger.remove_member(t.group_id, u2, u1).await.unwrap();
    assert!(!left.state.is_active());
    assert!(!t.ledger.is_active_member(u2, t.group_id).await.unwrap());
    assert!(t.ledger.was_ever_member(t.group_id, u2).await.unwrap());

    let err = t.ledger.remove_member(t.group_id, u2, u1).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let err = t.ledger.reinstate_member(t.group_id, u1, u1).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let back = t.ledger.reinstate_member(t.group_id, u2, u1).await.unwrap();
    assert!(back.state.is_active());

    let history: Vec<_> = t
        .ledger
        .member_history(t.group_id, u2, u1)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        history,
        vec![
            MembershipEventKind::Joined,
            MembershipEventKind::Left,
            MembershipEventKind::Rejoined,
        ]
    );
}

#[tokio::test]
async fn departed_members_lose_access() {
    let t = trio(SharePolicy::default()).await;
    let [u1, u2, _] = t.users;
    t.ledger.remove_member(t.group_id, u2, u1).await.unwrap();

    let err = t.ledger.members(t.group_id, u2).await.unwrap_err();
    assert!(matches!(err, LedgerError::Forbidden(_)));
    assert!(!t.ledger.was_ever_member(t.group_id, 9_999).await.unwrap());
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let t = trio(SharePolicy::default()).await;
    let err = t
        .ledger
        .members(t.group_id + 1, t.users[0])
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("group".to_string()));
}
