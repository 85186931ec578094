//! In-memory backend for quarry
//!
//! [`MemoryStore`] keeps tables in process memory and evaluates filters with
//! the same null semantics as the SQL backends, which makes it the backend of
//! choice for tests and examples:
//!
//! ```
//! use quarry_core::{Filter, Query, Repository};
//! use quarry_memory::MemoryStore;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//! quarry_core::entity!(User { id, name });
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let users = Repository::<User, _>::new(MemoryStore::new(), "users")?;
//! users.add(&User { id: 1, name: "Bob".into() }).await?;
//! users.add(&User { id: 2, name: "John".into() }).await?;
//!
//! let b = users.get_many(Query::from(Filter::starts_with("name", "B"))).await?;
//! assert_eq!(b, [User { id: 1, name: "Bob".into() }]);
//! # Ok::<_, quarry_core::QuarryError>(())
//! # }).unwrap();
//! ```

mod dialect;
mod predicate;
mod store;

pub use dialect::{MemoryDialect, MemoryStatement};
pub use predicate::Predicate;
pub use store::MemoryStore;
