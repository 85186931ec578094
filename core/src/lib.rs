//! # quarry-core
//!
//! Backend-neutral building blocks for quarry repositories:
//!
//! - [`Filter`] and [`Query`]: the predicate algebra and query descriptor
//! - [`Entity`] / [`Codec`]: record ↔ row conversion over static [`Field`] lists
//! - [`Dialect`] / [`Executor`]: the seams each backend crate implements
//! - [`Repository`]: the CRUD façade
//! - [`TransactionManager`]: scoped commit/rollback
//! - [`sql`]: rendering shared by the SQL dialects

pub mod codec;
pub mod command;
pub mod dialect;
pub mod error;
pub mod filter;
pub mod query;
pub mod repository;
pub mod row;
pub mod schema;
pub mod sql;
mod tracing;
pub mod transaction;
pub mod value;

pub use codec::{Codec, Entity, EntityCodec};
pub use command::Command;
pub use dialect::{Dialect, Executor, StatementOf};
pub use error::{QuarryError, Result, UsageError};
pub use filter::{Comparison, Filter, Operand, Operator};
pub use query::{Direction, OrderBy, Query};
pub use repository::{Hooks, NoHooks, Repository};
pub use row::Row;
pub use schema::{Field, FieldResolver, Fields};
pub use transaction::{TransactionManager, TransactionState};
pub use value::{Bytes, FromValue, Value};
