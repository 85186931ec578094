#![cfg(feature = "memory")]

use common::{Project, User, bob_and_john, names, projects, users};
use quarry::error::{QuarryError, UsageError};
use quarry::core::TransactionState;
use quarry::memory::MemoryStore;
use quarry::prelude::*;

mod common;

#[tokio::test]
async fn test_transaction_commit() {
    let store = MemoryStore::new();
    let users = users(&store);
    let projects = projects(&store);

    let mut tx = TransactionManager::new(store.clone());
    let added = tx
        .run(async || {
            users.add(&User::new(1, "Bob")).await?;
            projects.add(&Project::new("quarry", 1)).await?;
            Ok::<_, QuarryError>(2)
        })
        .await
        .unwrap();

    assert_eq!(added, 2);
    assert_eq!(tx.state(), TransactionState::Committed);
    assert!(!store.in_transaction());
    assert_eq!(names(&users.all().await.unwrap()), ["Bob"]);
    assert_eq!(projects.count(Filter::always()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_transaction_rollback_on_conflict() {
    let store = MemoryStore::new();
    let repo = bob_and_john(&store).await;
    let before = store.rows("users").unwrap();

    let mut tx = TransactionManager::new(store.clone());
    let err = tx
        .run(async || {
            repo.add(&User::new(3, "Jane")).await?;
            repo.update(&User::new(1, "Robert")).await?;
            // Duplicate identity
            repo.add(&User::new(2, "Johnny")).await?;
            Ok::<_, QuarryError>(())
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(tx.state(), TransactionState::RolledBack);
    assert_eq!(store.rows("users").unwrap(), before);
    assert_eq!(names(&repo.all().await.unwrap()), ["Bob", "John"]);
}

#[tokio::test]
async fn test_transaction_rollback_on_scope_error() {
    let store = MemoryStore::new();
    let repo = users(&store);

    let mut tx = TransactionManager::new(store.clone());
    let result = tx
        .run(async || {
            repo.add(&User::new(1, "Bob")).await?;
            repo.get(lookup! { name = "Alice" }).await?;
            Ok::<_, QuarryError>(())
        })
        .await;

    assert!(result.unwrap_err().is_not_found());
    assert!(repo.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_explicit_begin_commit_rollback() {
    let store = MemoryStore::new();
    let repo = users(&store);

    let mut tx = TransactionManager::new(store.clone());
    assert_eq!(tx.state(), TransactionState::Idle);
    tx.begin().await.unwrap();
    assert_eq!(tx.state(), TransactionState::Active);
    repo.add(&User::new(1, "Bob")).await.unwrap();
    tx.rollback().await.unwrap();
    assert!(repo.all().await.unwrap().is_empty());

    let mut tx = TransactionManager::new(store.clone());
    tx.begin().await.unwrap();
    repo.add(&User::new(1, "Bob")).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(repo.count(Filter::always()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reentry_after_terminal_state_is_usage_error() {
    let store = MemoryStore::new();
    let mut tx = TransactionManager::new(store.clone());
    tx.run(async || Ok::<_, QuarryError>(())).await.unwrap();

    let err = tx.begin().await.unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Usage(UsageError::TransactionState { action: "begin", .. })
    ));
    assert!(tx.commit().await.unwrap_err().is_usage());
    assert!(tx.rollback().await.unwrap_err().is_usage());
    assert!(
        tx.run(async || Ok::<_, QuarryError>(()))
            .await
            .unwrap_err()
            .is_usage()
    );
}

#[tokio::test]
async fn test_commit_before_begin_is_usage_error() {
    let mut tx = TransactionManager::new(MemoryStore::new());
    assert!(tx.commit().await.unwrap_err().is_usage());
    assert_eq!(tx.state(), TransactionState::Idle);
}

#[tokio::test]
async fn test_nested_transaction_on_one_handle() {
    let store = MemoryStore::new();
    let mut outer = TransactionManager::new(store.clone());
    let mut inner = TransactionManager::new(store.clone());

    outer.begin().await.unwrap();
    let err = inner.begin().await.unwrap_err();
    assert!(matches!(
        err,
        QuarryError::Usage(UsageError::NestedTransaction)
    ));
    assert_eq!(inner.state(), TransactionState::Idle);
    outer.commit().await.unwrap();

    // The handle is free again
    inner.begin().await.unwrap();
    inner.rollback().await.unwrap();
}

#[tokio::test]
async fn test_separate_stores_do_not_share_transactions() {
    let first = MemoryStore::new();
    let second = MemoryStore::new();
    let mut a = TransactionManager::new(first.clone());
    let mut b = TransactionManager::new(second.clone());

    a.begin().await.unwrap();
    b.begin().await.unwrap();
    users(&second).add(&User::new(1, "Bob")).await.unwrap();
    a.rollback().await.unwrap();
    b.commit().await.unwrap();

    assert_eq!(users(&second).count(Filter::always()).await.unwrap(), 1);
}
