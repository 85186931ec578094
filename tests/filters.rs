#![cfg(feature = "memory")]

use common::{Project, User, names, projects, timestamp, users};
use quarry::memory::MemoryStore;
use quarry::prelude::*;

mod common;

async fn seeded() -> Repository<Project, MemoryStore> {
    let repo = projects(&MemoryStore::new());
    let mut rows = vec![
        Project::new("Quarry", 1)
            .framework("tokio")
            .tags(&["db", "rust"])
            .stars(40),
        Project::new("quartz", 1).tags(&["time"]).stars(5),
        Project::new("Pebble", 2)
            .framework("async-std")
            .tags(&["db"])
            .stars(12),
        Project::new("boulder.rs", 3).stars(0),
    ];
    for (days, project) in rows.iter_mut().enumerate() {
        project.created_at = timestamp(days as i64);
    }
    repo.add_many(&rows).await.unwrap();
    repo
}

async fn titles(repo: &Repository<Project, MemoryStore>, query: impl Into<Query>) -> Vec<String> {
    let query: Query = query.into();
    let query = query.order_by("created_at");
    repo.get_many(query)
        .await
        .unwrap()
        .into_iter()
        .map(|project| project.title)
        .collect()
}

#[tokio::test]
async fn test_comparison_operators() {
    let repo = seeded().await;

    assert_eq!(titles(&repo, Filter::gt("stars", 10)).await, ["Quarry", "Pebble"]);
    assert_eq!(titles(&repo, Filter::gte("stars", 12)).await, ["Quarry", "Pebble"]);
    assert_eq!(titles(&repo, Filter::lt("stars", 5)).await, ["boulder.rs"]);
    assert_eq!(
        titles(&repo, Filter::lte("stars", 5)).await,
        ["quartz", "boulder.rs"]
    );
    assert_eq!(
        titles(&repo, Filter::ne("owner", 1)).await,
        ["Pebble", "boulder.rs"]
    );
    assert_eq!(
        titles(&repo, Filter::gte("created_at", timestamp(2))).await,
        ["Pebble", "boulder.rs"]
    );
}

#[tokio::test]
async fn test_text_operators() {
    let repo = seeded().await;

    assert_eq!(titles(&repo, Filter::starts_with("title", "Qu")).await, ["Quarry"]);
    assert_eq!(
        titles(&repo, Filter::istarts_with("title", "qu")).await,
        ["Quarry", "quartz"]
    );
    assert_eq!(titles(&repo, Filter::ends_with("title", ".rs")).await, ["boulder.rs"]);
    assert_eq!(titles(&repo, Filter::iends_with("title", "LE")).await, ["Pebble"]);
    assert_eq!(titles(&repo, Filter::contains("title", "ar")).await, ["Quarry", "quartz"]);
    assert_eq!(titles(&repo, Filter::icontains("title", "EBB")).await, ["Pebble"]);
    assert_eq!(titles(&repo, Filter::matches("title", "^[a-z]+$")).await, ["quartz"]);
    assert_eq!(
        titles(&repo, Filter::imatches("title", "^q.*[yz]$")).await,
        ["Quarry", "quartz"]
    );
    // Pattern metacharacters in plain operators are literal
    assert!(titles(&repo, Filter::ends_with("title", "r.")).await.is_empty());
}

#[tokio::test]
async fn test_set_operators() {
    let repo = seeded().await;

    assert_eq!(
        titles(&repo, Filter::is_in("owner", [2, 3])).await,
        ["Pebble", "boulder.rs"]
    );
    assert_eq!(
        titles(&repo, Filter::has_any("tags", ["db", "web"])).await,
        ["Quarry", "Pebble"]
    );
    assert!(titles(&repo, Filter::has_any("tags", Vec::<String>::new())).await.is_empty());
}

#[tokio::test]
async fn test_empty_in_matches_nothing() {
    let repo = seeded().await;

    let none = Filter::is_in("owner", Vec::<i64>::new());
    assert!(titles(&repo, none.clone()).await.is_empty());
    assert_eq!(titles(&repo, !none).await.len(), 4);
    assert_eq!(
        titles(&repo, Filter::is_in("owner", Vec::<i64>::new()) | Filter::eq("owner", 3)).await,
        ["boulder.rs"]
    );
}

#[tokio::test]
async fn test_null_semantics() {
    let repo = seeded().await;

    assert_eq!(
        titles(&repo, Filter::eq("framework", Value::Null)).await,
        ["quartz", "boulder.rs"]
    );
    assert_eq!(
        titles(&repo, Filter::is_not_null("framework")).await,
        ["Quarry", "Pebble"]
    );
    // Neither side of a comparison against a null cell selects it
    assert_eq!(
        titles(&repo, Filter::eq("framework", "tokio")).await,
        ["Quarry"]
    );
    assert_eq!(
        titles(&repo, !Filter::eq("framework", "tokio")).await,
        ["Pebble"]
    );
}

#[tokio::test]
async fn test_composition() {
    let repo = seeded().await;

    let popular = Filter::gt("stars", 10);
    let mine = Filter::eq("owner", 1);
    assert_eq!(titles(&repo, popular.clone() & mine.clone()).await, ["Quarry"]);
    assert_eq!(
        titles(&repo, popular.clone() | mine.clone()).await,
        ["Quarry", "quartz", "Pebble"]
    );
    assert_eq!(titles(&repo, !(popular | mine)).await, ["boulder.rs"]);
    assert_eq!(titles(&repo, Filter::any_of([])).await.len(), 0);
    assert_eq!(titles(&repo, Filter::all_of([])).await.len(), 4);
}

#[tokio::test]
async fn test_partition_over_non_null_fields() {
    let repo = seeded().await;
    let all = titles(&repo, Query::new()).await;

    for filter in [
        Filter::gt("stars", 10),
        Filter::starts_with("title", "Q"),
        Filter::is_in("owner", [1, 3]),
        Filter::has_any("tags", ["db"]),
        Filter::lt("created_at", timestamp(1)) | Filter::eq("stars", 0),
    ] {
        let mut matched = titles(&repo, filter.clone()).await;
        let rest = titles(&repo, !filter).await;
        assert!(matched.iter().all(|title| !rest.contains(title)));
        matched.extend(rest);
        matched.sort();
        let mut expected = all.clone();
        expected.sort();
        assert_eq!(matched, expected);
    }
}

#[tokio::test]
async fn test_malformed_filters_are_rejected() {
    let repo = seeded().await;

    let err = repo
        .get_many(Filter::matches("title", "(unclosed"))
        .await
        .unwrap_err();
    assert!(err.is_usage());

    let err = repo.get_many(Filter::gt("stars", Value::Null)).await.unwrap_err();
    assert!(err.is_usage());
}

#[tokio::test]
async fn test_network_ranges() {
    let repo = users(&MemoryStore::new());
    for (id, name) in [(1, "10.1.2.3"), (2, "10.0.0.0/16"), (3, "192.168.0.1"), (4, "Bob")] {
        repo.add(&User::new(id, name)).await.unwrap();
    }
    let query = |filter: Filter| Query::from(filter).order_by("id");

    let inside = repo.get_many(query(Filter::ip_in("name", "10.0.0.0/8"))).await.unwrap();
    assert_eq!(names(&inside), ["10.1.2.3", "10.0.0.0/16"]);
    let outside = repo
        .get_many(query(Filter::not_ip_in("name", "10.0.0.0/8")))
        .await
        .unwrap();
    assert_eq!(names(&outside), ["192.168.0.1"]);
    let narrower = repo
        .get_many(query(Filter::ip_in("name", "10.0.0.0/24")))
        .await
        .unwrap();
    assert!(narrower.is_empty());
}
