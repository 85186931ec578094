//! # Quarry
//!
//! A backend-neutral repository layer for Rust: describe records once, filter
//! them with one predicate algebra, and run the same code against PostgreSQL,
//! ClickHouse or an in-memory store.
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry::prelude::*;
//! use quarry::memory::MemoryStore;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//! quarry::entity!(User { id, name });
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> quarry::Result<()> {
//! let users = Repository::<User, _>::new(MemoryStore::new(), "users")?;
//! users.add(&User { id: 1, name: "Bob".into() }).await?;
//! users.add(&User { id: 2, name: "John".into() }).await?;
//!
//! let ordered = users.get_many(Query::new().order_by("name")).await?;
//! assert_eq!(ordered.len(), 2);
//!
//! let bob = users.get(lookup! { name = "Bob" }).await?;
//! assert_eq!(bob.id, 1);
//!
//! users.delete(Filter::eq("id", 2)).await?;
//! assert!(!users.exists(Filter::eq("name", "John")).await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backend Support
//!
//! | Backend    | Executor             | Feature Flag     | Transactions |
//! |------------|----------------------|------------------|--------------|
//! | Memory     | `MemoryStore`        | `memory`         | ✅ snapshot  |
//! | PostgreSQL | `PostgresExecutor`   | `tokio-postgres` | ✅           |
//! | ClickHouse | `ClickHouseExecutor` | `http`           | ❌ (no-op)   |
//!
//! The `postgres` and `clickhouse` features alone provide the dialects, which
//! render statements without a driver.

#![cfg_attr(docsrs, feature(doc_cfg))]

// =============================================================================
// Root-level exports
// =============================================================================

/// Result type for quarry operations
pub use quarry_core::Result;

/// Error types
pub mod error {
    pub use quarry_core::error::{QuarryError, UsageError};
}

pub use quarry_core::{entity, lookup};

// =============================================================================
// Core module - shared functionality
// =============================================================================

/// Backend-neutral types and traits.
///
/// # Module Structure
///
/// - **Records**: `Entity`, `Codec`, `EntityCodec`, `Field`, `Fields`, `Row`, `Value`, `Bytes`
/// - **Predicates**: `Filter`, `Comparison`, `Operator`, `Query`, `OrderBy`
/// - **Seams**: `Dialect`, `Executor`, `Command`
/// - **Operations**: `Repository`, `Hooks`, `TransactionManager`
pub mod core {
    pub use quarry_core::{
        Bytes, Codec, Command, Comparison, Dialect, Direction, Entity, EntityCodec, Executor, Field,
        FieldResolver, Fields, Filter, FromValue, Hooks, NoHooks, Operand, Operator, OrderBy,
        Query, Repository, Row, StatementOf, TransactionManager, TransactionState, Value,
    };

    /// Shared SQL rendering used by the SQL dialects.
    pub use quarry_core::sql;
}

// =============================================================================
// Backends
// =============================================================================

/// PostgreSQL dialect and, with `tokio-postgres`, its executor.
#[cfg(feature = "postgres")]
pub mod postgres {
    pub use quarry_postgres::*;
}

/// ClickHouse dialect and, with `http`, its executor.
#[cfg(feature = "clickhouse")]
pub mod clickhouse {
    pub use quarry_clickhouse::*;
}

/// Process-local store for tests and examples.
#[cfg(feature = "memory")]
pub mod memory {
    pub use quarry_memory::*;
}

// =============================================================================
// Prelude
// =============================================================================

/// Everything needed to declare entities and run repository operations.
///
/// ```rust
/// use quarry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{QuarryError, UsageError};
    pub use quarry_core::{
        Bytes, Codec, Direction, Entity, EntityCodec, Executor, Field, Filter, Hooks, OrderBy,
        Query, Repository, Row, TransactionManager, Value, entity, lookup,
    };
}
