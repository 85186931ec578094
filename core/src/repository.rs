//! The generic CRUD façade.
//!
//! A [`Repository`] binds one entity type to one table on one shared
//! [`Executor`]. Every operation builds a [`Command`], lets the executor's
//! dialect render it and runs the result; rows come back through the
//! repository's [`Codec`].
//!
//! ```
//! # use quarry_core::{Filter, Query, Repository, lookup};
//! # async fn demo<X: quarry_core::Executor>(users: Repository<User, X>) -> quarry_core::Result<()> {
//! users.add(&User { id: 1, name: "Bob".into() }).await?;
//! let bob = users.get(lookup! { id = 1 }).await?;
//! let b_names = users
//!     .get_many(Query::new().filter(Filter::starts_with("name", "B")).order_by("name"))
//!     .await?;
//! users.delete(lookup! { id = 1 }).await?;
//! # let _ = (bob, b_names);
//! # Ok(())
//! # }
//! # #[derive(Debug, Clone, PartialEq)]
//! # struct User { id: i64, name: String }
//! # quarry_core::entity!(User { id, name });
//! ```

use core::future::Future;
use core::marker::PhantomData;
use std::borrow::Cow;

use crate::codec::{Codec, Entity, EntityCodec};
use crate::command::Command;
use crate::dialect::{Dialect, Executor};
use crate::error::{QuarryError, Result};
use crate::filter::Filter;
use crate::query::Query;
use crate::row::Row;
use crate::schema::Fields;

/// Post-operation hooks for composing records across tables.
///
/// Every hook defaults to a no-op. A failing hook fails the operation; outside
/// a transaction, writes already made are not undone.
pub trait Hooks<E: Send + Sync>: Send + Sync {
    /// Runs after the primary row of `entity` has been inserted.
    fn after_add(&self, entity: &E) -> impl Future<Output = Result<()>> + Send {
        let _ = entity;
        async { Ok(()) }
    }

    /// Runs after the primary row of `entity` has been replaced.
    fn after_update(&self, entity: &E) -> impl Future<Output = Result<()>> + Send {
        let _ = entity;
        async { Ok(()) }
    }

    /// Runs for every record read back from the store.
    fn after_load(&self, entity: &mut E) -> impl Future<Output = Result<()>> + Send {
        let _ = entity;
        async { Ok(()) }
    }
}

/// No hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<E: Send + Sync> Hooks<E> for NoHooks {}

pub struct Repository<E, X, C = EntityCodec<E>, H = NoHooks> {
    table: Cow<'static, str>,
    executor: X,
    codec: C,
    hooks: H,
    fields: Fields,
    _entity: PhantomData<fn() -> E>,
}

impl<E, X, C, H> core::fmt::Debug for Repository<E, X, C, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.table)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl<E: Entity, X: Executor> Repository<E, X> {
    /// A repository using the entity's own field declaration.
    pub fn new(executor: X, table: impl Into<Cow<'static, str>>) -> Result<Self> {
        Self::with_codec(executor, table, EntityCodec::new())
    }
}

impl<E, X: Executor, C: Codec<E>> Repository<E, X, C> {
    /// A repository using a custom codec. The codec's field list is validated here.
    pub fn with_codec(executor: X, table: impl Into<Cow<'static, str>>, codec: C) -> Result<Self> {
        let fields = Fields::new(codec.fields(), codec.key())?;
        Ok(Self {
            table: table.into(),
            executor,
            codec,
            hooks: NoHooks,
            fields,
            _entity: PhantomData,
        })
    }
}

impl<E, X, C, H> Repository<E, X, C, H> {
    /// Replaces the repository's hooks.
    pub fn with_hooks<H2>(self, hooks: H2) -> Repository<E, X, C, H2> {
        Repository {
            table: self.table,
            executor: self.executor,
            codec: self.codec,
            hooks,
            fields: self.fields,
            _entity: PhantomData,
        }
    }

    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[inline]
    pub fn executor(&self) -> &X {
        &self.executor
    }

    #[inline]
    pub fn codec(&self) -> &C {
        &self.codec
    }

    #[inline]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}

impl<E, X, C, H> Repository<E, X, C, H>
where
    E: Send + Sync,
    X: Executor,
    C: Codec<E>,
    H: Hooks<E>,
{
    /// Inserts one record, then runs [`Hooks::after_add`].
    ///
    /// A uniqueness violation fails with [`QuarryError::Conflict`].
    pub async fn add(&self, entity: &E) -> Result<()> {
        let row = self.dump(entity)?;
        self.insert(core::slice::from_ref(&row)).await?;
        self.hooks.after_add(entity).await
    }

    /// Inserts every record in one statement, then runs [`Hooks::after_add`]
    /// for each. An empty batch does nothing.
    pub async fn add_many(&self, entities: &[E]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let rows = entities
            .iter()
            .map(|entity| self.dump(entity))
            .collect::<Result<Vec<_>>>()?;
        self.insert(&rows).await?;
        for entity in entities {
            self.hooks.after_add(entity).await?;
        }
        Ok(())
    }

    /// Replaces the stored record with the same identity, then runs
    /// [`Hooks::after_update`].
    ///
    /// Returns the number of rows the backend reports as changed. Updating a
    /// record that does not exist is not an error; callers that care check for `0`.
    pub async fn update(&self, entity: &E) -> Result<u64> {
        let row = self.dump(entity)?;
        let command = Command::Update {
            table: &self.table,
            key: self.fields.key(),
            row: &row,
        };
        let affected = self.execute(&command).await?;
        self.hooks.after_update(entity).await?;
        Ok(affected)
    }

    /// The single record matching `filter`.
    ///
    /// Fails with [`QuarryError::NotFound`] when nothing matches and
    /// [`QuarryError::Query`] when more than one record does.
    pub async fn get(&self, filter: impl Into<Filter>) -> Result<E> {
        self.get_one(filter.into(), false).await
    }

    /// Like [`get`](Self::get), locking the row until the surrounding
    /// transaction ends on backends that support row locks.
    pub async fn get_for_update(&self, filter: impl Into<Filter>) -> Result<E> {
        self.get_one(filter.into(), true).await
    }

    /// Every record matching `query`, in the requested order.
    pub async fn get_many(&self, query: impl Into<Query>) -> Result<Vec<E>> {
        let rows = self.select(&query.into(), false).await?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            entities.push(self.load(row).await?);
        }
        Ok(entities)
    }

    /// Every record in the table, in backend order.
    pub async fn all(&self) -> Result<Vec<E>> {
        self.get_many(Query::new()).await
    }

    /// The first record of `query`, or [`QuarryError::NotFound`].
    pub async fn first(&self, query: impl Into<Query>) -> Result<E> {
        let mut rows = self.select(&query.into().limit(1), false).await?;
        match rows.pop() {
            Some(row) => self.load(row).await,
            None => Err(QuarryError::NotFound),
        }
    }

    /// Removes every record matching `filter` and returns how many went.
    ///
    /// Matching nothing is not an error. [`Filter::always`] empties the table.
    pub async fn delete(&self, filter: impl Into<Filter>) -> Result<u64> {
        let filter = filter.into();
        filter.validate(&self.fields)?;
        let command = Command::Delete {
            table: &self.table,
            filter: &filter,
        };
        self.execute(&command).await
    }

    /// Whether any record matches `filter`.
    pub async fn exists(&self, filter: impl Into<Filter>) -> Result<bool> {
        let query = Query::from(filter.into()).limit(1);
        Ok(!self.select(&query, false).await?.is_empty())
    }

    /// Number of records matching `filter`.
    pub async fn count(&self, filter: impl Into<Filter>) -> Result<u64> {
        let filter = filter.into();
        filter.validate(&self.fields)?;
        let command = Command::Count {
            table: &self.table,
            filter: &filter,
        };
        let statement = self.executor.dialect().render(&command, &self.fields)?;
        let rows = self.executor.fetch(&statement).await?;
        match rows.first() {
            Some(row) => {
                let count = row.decode::<i64>("count")?;
                u64::try_from(count)
                    .map_err(|_| QuarryError::Mapping(format!("invalid row count {count}")))
            }
            None => Ok(0),
        }
    }

    async fn get_one(&self, filter: Filter, lock: bool) -> Result<E> {
        let query = Query::from(filter).limit(2);
        let mut rows = self.select(&query, lock).await?;
        match rows.len() {
            0 => Err(QuarryError::NotFound),
            1 => match rows.pop() {
                Some(row) => self.load(row).await,
                None => Err(QuarryError::NotFound),
            },
            _ => Err(QuarryError::Query(format!(
                "expected one row from `{}`, found several",
                self.table
            ))),
        }
    }

    async fn select(&self, query: &Query, lock: bool) -> Result<Vec<Row>> {
        query.validate(&self.fields)?;
        let command = Command::Select {
            table: &self.table,
            query,
            lock,
        };
        let statement = self.executor.dialect().render(&command, &self.fields)?;
        self.executor.fetch(&statement).await
    }

    async fn insert(&self, rows: &[Row]) -> Result<u64> {
        let command = Command::Insert {
            table: &self.table,
            key: self.fields.key(),
            rows,
        };
        self.execute(&command).await
    }

    async fn execute(&self, command: &Command<'_>) -> Result<u64> {
        let statement = self.executor.dialect().render(command, &self.fields)?;
        self.executor.execute(&statement).await
    }

    fn dump(&self, entity: &E) -> Result<Row> {
        let row = self.codec.dump(entity)?;
        self.fields.check_row(&row)?;
        Ok(row)
    }

    async fn load(&self, row: Row) -> Result<E> {
        let row = self.fields.to_fields(row)?;
        let mut entity = self.codec.load(row)?;
        self.hooks.after_load(&mut entity).await?;
        Ok(entity)
    }
}

