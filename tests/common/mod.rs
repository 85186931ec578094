#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use quarry::memory::MemoryStore;
use quarry::prelude::*;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

quarry::entity!(User { id, name, email });

impl User {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_owned());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub owner: i64,
    pub framework: Option<String>,
    pub tags: Vec<String>,
    pub stars: i32,
    pub created_at: DateTime<Utc>,
}

quarry::entity!(Project {
    id,
    title,
    owner as "owner_id",
    framework,
    tags,
    stars,
    created_at,
});

impl Project {
    pub fn new(title: &str, owner: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_owned(),
            owner,
            framework: None,
            tags: Vec::new(),
            stars: 0,
            created_at: timestamp(0),
        }
    }

    pub fn framework(mut self, framework: &str) -> Self {
        self.framework = Some(framework.to_owned());
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|tag| (*tag).to_owned()).collect();
        self
    }

    pub fn stars(mut self, stars: i32) -> Self {
        self.stars = stars;
        self
    }
}

/// Midnight UTC on 2024-01-01 plus `days`.
pub fn timestamp(days: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(days)
}

pub fn users(store: &MemoryStore) -> Repository<User, MemoryStore> {
    Repository::new(store.clone(), "users").unwrap()
}

pub fn projects(store: &MemoryStore) -> Repository<Project, MemoryStore> {
    Repository::new(store.clone(), "projects").unwrap()
}

/// Bob(1) and John(2), inserted in that order.
pub async fn bob_and_john(store: &MemoryStore) -> Repository<User, MemoryStore> {
    let repo = users(store);
    repo.add(&User::new(1, "Bob")).await.unwrap();
    repo.add(&User::new(2, "John")).await.unwrap();
    repo
}

pub fn names(users: &[User]) -> Vec<&str> {
    users.iter().map(|user| user.name.as_str()).collect()
}
