//! Repository and transaction tests against a running PostgreSQL.
//!
//! Set `DATABASE_URL` (a libpq connection string) to run them; without it
//! every test returns early.

#![cfg(feature = "tokio-postgres")]

use common::{Project, User, names, timestamp};
use quarry::error::{QuarryError, UsageError};
use quarry::postgres::PostgresExecutor;
use quarry::prelude::*;

mod common;

async fn connect() -> Option<PostgresExecutor> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping");
        return None;
    };
    Some(PostgresExecutor::connect(&url).await.expect("connect"))
}

/// A fresh table name per test so runs never collide.
fn table(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}

async fn users(executor: &PostgresExecutor) -> Repository<User, PostgresExecutor> {
    let name = table("quarry_users");
    executor
        .client()
        .batch_execute(&format!(
            r#"CREATE TABLE "{name}" (id BIGINT PRIMARY KEY, name TEXT NOT NULL, email TEXT UNIQUE)"#
        ))
        .await
        .expect("create table");
    Repository::new(executor.clone(), name).unwrap()
}

async fn projects(executor: &PostgresExecutor) -> Repository<Project, PostgresExecutor> {
    let name = table("quarry_projects");
    executor
        .client()
        .batch_execute(&format!(
            r#"CREATE TABLE "{name}" (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                owner_id BIGINT NOT NULL,
                framework TEXT,
                tags TEXT[] NOT NULL,
                stars INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )"#
        ))
        .await
        .expect("create table");
    Repository::new(executor.clone(), name).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
struct Reading {
    id: i64,
    amount: String,
    ratio: f64,
    day: chrono::DateTime<chrono::Utc>,
    at: String,
    payload: String,
    addr: String,
    blob: Vec<u8>,
    signature: Bytes,
}

quarry::entity!(Reading {
    id,
    amount,
    ratio,
    day,
    at,
    payload,
    addr,
    blob,
    signature,
});

impl Reading {
    fn new(id: i64, addr: &str) -> Self {
        Self {
            id,
            amount: "12.50".to_owned(),
            ratio: 0.25,
            day: timestamp(3),
            at: "12:30:00".to_owned(),
            payload: r#"{"a":1}"#.to_owned(),
            addr: addr.to_owned(),
            blob: vec![0, 1, 255],
            signature: Bytes(vec![7, 8]),
        }
    }
}

async fn readings(executor: &PostgresExecutor) -> Repository<Reading, PostgresExecutor> {
    let name = table("quarry_readings");
    executor
        .client()
        .batch_execute(&format!(
            r#"CREATE TABLE "{name}" (
                id BIGINT PRIMARY KEY,
                amount NUMERIC(10, 2) NOT NULL,
                ratio NUMERIC NOT NULL,
                day DATE NOT NULL,
                at TIME NOT NULL,
                payload JSONB NOT NULL,
                addr INET NOT NULL,
                blob BYTEA NOT NULL,
                signature BYTEA NOT NULL
            )"#
        ))
        .await
        .expect("create table");
    Repository::new(executor.clone(), name).unwrap()
}

#[tokio::test]
async fn test_bob_and_john() {
    let Some(executor) = connect().await else { return };
    let repo = users(&executor).await;

    repo.add(&User::new(1, "Bob")).await.unwrap();
    repo.add(&User::new(2, "John")).await.unwrap();

    let ordered = repo.get_many(Query::new().order_by("name")).await.unwrap();
    assert_eq!(names(&ordered), ["Bob", "John"]);
    let b = repo.get_many(Filter::starts_with("name", "B")).await.unwrap();
    assert_eq!(names(&b), ["Bob"]);

    assert_eq!(repo.delete(lookup! { id = 2 }).await.unwrap(), 1);
    assert_eq!(names(&repo.all().await.unwrap()), ["Bob"]);
}

#[tokio::test]
async fn test_round_trip_and_conflicts() {
    let Some(executor) = connect().await else { return };
    let repo = projects(&executor).await;

    let project = Project::new("quarry", 1)
        .framework("tokio")
        .tags(&["db", "rust"])
        .stars(3);
    repo.add(&project).await.unwrap();
    assert_eq!(repo.get(Filter::eq("id", project.id)).await.unwrap(), project);
    assert!(
        repo.get_many(Filter::has_any("tags", ["rust"]))
            .await
            .unwrap()
            .contains(&project)
    );

    let err = repo.add(&project).await.unwrap_err();
    assert!(err.is_conflict(), "{err:?}");
    assert_eq!(repo.count(Filter::always()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_and_empty_in() {
    let Some(executor) = connect().await else { return };
    let repo = users(&executor).await;
    repo.add(&User::new(1, "Bob")).await.unwrap();

    assert_eq!(repo.update(&User::new(1, "Robert")).await.unwrap(), 1);
    assert_eq!(repo.update(&User::new(5, "Nobody")).await.unwrap(), 0);
    assert_eq!(repo.get(lookup! { id = 1 }).await.unwrap().name, "Robert");
    assert!(
        repo.get_many(Filter::is_in("id", Vec::<i64>::new()))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_transaction_rollback() {
    let Some(executor) = connect().await else { return };
    let repo = users(&executor).await;
    repo.add(&User::new(1, "Bob").with_email("bob@example.com"))
        .await
        .unwrap();

    let mut tx = TransactionManager::new(executor.clone());
    let err = tx
        .run(async || {
            repo.add(&User::new(2, "John")).await?;
            repo.add(&User::new(3, "Bobby").with_email("bob@example.com"))
                .await?;
            Ok::<_, QuarryError>(())
        })
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(names(&repo.all().await.unwrap()), ["Bob"]);

    let mut nested = TransactionManager::new(executor.clone());
    let mut outer = TransactionManager::new(executor.clone());
    outer.begin().await.unwrap();
    assert!(matches!(
        nested.begin().await,
        Err(QuarryError::Usage(UsageError::NestedTransaction))
    ));
    outer.rollback().await.unwrap();
}

#[tokio::test]
async fn test_structured_columns_round_trip() {
    let Some(executor) = connect().await else { return };
    let repo = readings(&executor).await;

    let inside = Reading::new(1, "10.1.2.3");
    let outside = Reading::new(2, "192.168.0.1");
    repo.add_many(&[inside, outside]).await.unwrap();

    let loaded = repo.get(lookup! { id = 1 }).await.unwrap();
    assert_eq!(loaded.amount, "12.50");
    assert_eq!(loaded.ratio, 0.25);
    assert_eq!(loaded.day, timestamp(3));
    assert_eq!(loaded.at, "12:30:00");
    assert_eq!(loaded.payload, r#"{"a":1}"#);
    assert!(loaded.addr.starts_with("10.1.2.3"), "{}", loaded.addr);
    assert_eq!(loaded.blob, [0, 1, 255]);
    assert_eq!(loaded.signature, Bytes(vec![7, 8]));

    let local = repo.get_many(Filter::ip_in("addr", "10.0.0.0/8")).await.unwrap();
    assert_eq!(local.iter().map(|r| r.id).collect::<Vec<_>>(), [1]);
    let remote = repo.get_many(Filter::not_ip_in("addr", "10.0.0.0/8")).await.unwrap();
    assert_eq!(remote.iter().map(|r| r.id).collect::<Vec<_>>(), [2]);
}

#[tokio::test]
async fn test_unsupported_column_type_names_the_type() {
    let Some(executor) = connect().await else { return };
    let name = table("quarry_points");
    executor
        .client()
        .batch_execute(&format!(
            r#"CREATE TABLE "{name}" (id BIGINT PRIMARY KEY, name POINT NOT NULL, email TEXT);
               INSERT INTO "{name}" VALUES (1, point(1, 2))"#
        ))
        .await
        .expect("create table");
    let repo: Repository<User, PostgresExecutor> = Repository::new(executor.clone(), name).unwrap();

    let err = repo.all().await.unwrap_err();
    assert!(
        matches!(&err, QuarryError::Mapping(message) if message.contains("point")),
        "{err:?}"
    );
}
