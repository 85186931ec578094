//! The in-memory executor.

use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;
use quarry_core::{
    Direction, Executor, QuarryError, Result, Row, UsageError, Value, quarry_trace_query,
    quarry_trace_tx,
};

use crate::dialect::{MemoryDialect, MemoryStatement};
use crate::predicate::{Predicate, column_value, order, same};

#[derive(Debug, Clone, Default)]
struct Table {
    /// Rows in insertion order.
    rows: Vec<Row>,
    /// Columns that must hold distinct non-null values, besides the key.
    unique: Vec<String>,
}

impl Table {
    /// Finds a row other than `skip` that collides with `row` on `column`.
    fn collides(&self, row: &Row, column: &str, skip: Option<usize>) -> bool {
        let value = column_value(row, column);
        !value.is_null()
            && self
                .rows
                .iter()
                .enumerate()
                .any(|(i, other)| Some(i) != skip && same(column_value(other, column), value))
    }

    fn check_unique(&self, row: &Row, key: &str, skip: Option<usize>) -> Result<()> {
        for column in core::iter::once(key).chain(self.unique.iter().map(String::as_str)) {
            if self.collides(row, column, skip) {
                return Err(QuarryError::Conflict(format!(
                    "duplicate value {} for unique column `{column}`",
                    column_value(row, column)
                )));
            }
        }
        Ok(())
    }

    fn select(&self, predicate: &Predicate) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(move |row| predicate.matches(row))
    }
}

type Tables = HashMap<String, Table>;

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    /// Tables as they were at `begin`, while a transaction is open.
    snapshot: Option<Tables>,
}

/// Process-local storage implementing [`Executor`].
///
/// Tables are created on first write. The entity's key column is always
/// unique; further unique columns are declared with [`MemoryStore::unique`].
/// Transactions snapshot every table at `begin` and restore the snapshot on
/// `rollback`.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| QuarryError::Execution("memory store lock poisoned".to_owned()))
    }

    /// Declares `column` of `table` unique; later writes that would duplicate
    /// a non-null value fail with [`QuarryError::Conflict`].
    pub fn unique(&self, table: &str, column: &str) -> Result<()> {
        let mut state = self.lock()?;
        let table = state.tables.entry_ref(table).or_default();
        if !table.unique.iter().any(|known| known == column) {
            table.unique.push(column.to_owned());
        }
        Ok(())
    }

    /// Copies of the stored rows of `table`, column-keyed, in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let state = self.lock()?;
        Ok(state
            .tables
            .get(table)
            .map(|table| table.rows.clone())
            .unwrap_or_default())
    }

    pub fn in_transaction(&self) -> bool {
        self.lock().is_ok_and(|state| state.snapshot.is_some())
    }

    fn run(&self, statement: &MemoryStatement) -> Result<Outcome> {
        quarry_trace_query!(statement, statement.value_count());
        let mut state = self.lock()?;
        let tables = &mut state.tables;
        match statement {
            MemoryStatement::Select {
                table,
                columns,
                predicate,
                order: keys,
                limit,
                offset,
            } => {
                let Some(table) = tables.get(table.as_str()) else {
                    return Ok(Outcome::Rows(Vec::new()));
                };
                let mut rows: Vec<&Row> = table.select(predicate).collect();
                // Stable, so ties keep insertion order
                rows.sort_by(|left, right| {
                    keys.iter()
                        .map(|(column, direction)| {
                            let ordering =
                                order(column_value(left, column), column_value(right, column));
                            match direction {
                                Direction::Asc => ordering,
                                Direction::Desc => ordering.reverse(),
                            }
                        })
                        .find(|ordering| ordering.is_ne())
                        .unwrap_or(core::cmp::Ordering::Equal)
                });
                let skip = offset.map_or(0, saturating_usize);
                let take = limit.map_or(usize::MAX, saturating_usize);
                Ok(Outcome::Rows(
                    rows.into_iter()
                        .skip(skip)
                        .take(take)
                        .map(|row| project(row, columns))
                        .collect(),
                ))
            }
            MemoryStatement::Count { table, predicate } => {
                let count = tables
                    .get(table.as_str())
                    .map_or(0, |table| table.select(predicate).count());
                let count = i64::try_from(count)
                    .map_err(|_| QuarryError::Execution("row count overflow".to_owned()))?;
                Ok(Outcome::Rows(vec![Row::new().with("count", count)]))
            }
            MemoryStatement::Insert { table, key, rows } => {
                let table = tables.entry_ref(table.as_str()).or_default();
                let before = table.rows.len();
                for row in rows {
                    if let Err(e) = table.check_unique(row, key, None) {
                        // All or nothing
                        table.rows.truncate(before);
                        return Err(e);
                    }
                    table.rows.push(row.clone());
                }
                Ok(Outcome::Affected(rows.len() as u64))
            }
            MemoryStatement::Update { table, key, row } => {
                let Some(table) = tables.get_mut(table.as_str()) else {
                    return Ok(Outcome::Affected(0));
                };
                let target = column_value(row, key);
                if target.is_null() {
                    return Err(UsageError::MissingField((*key).to_owned()).into());
                }
                let matched: Vec<usize> = table
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(_, stored)| same(column_value(stored, key), target))
                    .map(|(i, _)| i)
                    .collect();
                for &i in &matched {
                    table.check_unique(row, key, Some(i))?;
                }
                for &i in &matched {
                    let stored = &mut table.rows[i];
                    for (column, value) in row.iter() {
                        stored.insert(column, value.clone());
                    }
                }
                Ok(Outcome::Affected(matched.len() as u64))
            }
            MemoryStatement::Delete { table, predicate } => {
                let Some(table) = tables.get_mut(table.as_str()) else {
                    return Ok(Outcome::Affected(0));
                };
                let before = table.rows.len();
                table.rows.retain(|row| !predicate.matches(row));
                Ok(Outcome::Affected((before - table.rows.len()) as u64))
            }
        }
    }
}

enum Outcome {
    Rows(Vec<Row>),
    Affected(u64),
}

fn saturating_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

/// The row restricted to `columns`, in descriptor order; absent cells are `NULL`.
fn project(row: &Row, columns: &[&'static str]) -> Row {
    columns
        .iter()
        .map(|column| (*column, row.get(column).cloned().unwrap_or(Value::Null)))
        .collect()
}

impl Executor for MemoryStore {
    type Dialect = MemoryDialect;

    #[inline]
    fn dialect(&self) -> &MemoryDialect {
        &MemoryDialect
    }

    async fn fetch(&self, statement: &MemoryStatement) -> Result<Vec<Row>> {
        match self.run(statement)? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Ok(Vec::new()),
        }
    }

    async fn execute(&self, statement: &MemoryStatement) -> Result<u64> {
        match self.run(statement)? {
            Outcome::Rows(rows) => Ok(rows.len() as u64),
            Outcome::Affected(count) => Ok(count),
        }
    }

    async fn begin(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.snapshot.is_some() {
            return Err(UsageError::NestedTransaction.into());
        }
        state.snapshot = Some(state.tables.clone());
        quarry_trace_tx!("begin", "memory");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.lock()?.snapshot = None;
        quarry_trace_tx!("commit", "memory");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(snapshot) = state.snapshot.take() {
            state.tables = snapshot;
        }
        quarry_trace_tx!("rollback", "memory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::{Command, Dialect, Field, Fields, Filter, Query};

    const USERS: &[Field] = &[Field::new("id"), Field::new("email"), Field::new("name")];

    fn fields() -> Fields {
        Fields::new(USERS, "id").unwrap()
    }

    fn user(id: i64, email: &str, name: Option<&str>) -> Row {
        Row::new()
            .with("id", id)
            .with("email", email)
            .with("name", name)
    }

    async fn insert(store: &MemoryStore, rows: &[Row]) -> Result<u64> {
        let statement = MemoryDialect.render(
            &Command::Insert {
                table: "users",
                key: "id",
                rows,
            },
            &fields(),
        )?;
        store.execute(&statement).await
    }

    async fn select(store: &MemoryStore, query: Query) -> Vec<Row> {
        let statement = MemoryDialect
            .render(
                &Command::Select {
                    table: "users",
                    query: &query,
                    lock: false,
                },
                &fields(),
            )
            .unwrap();
        store.fetch(&statement).await.unwrap()
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter().map(|row| row.decode("id").unwrap()).collect()
    }

    #[tokio::test]
    async fn duplicate_keys_conflict_without_partial_writes() {
        let store = MemoryStore::new();
        insert(&store, &[user(1, "a@x", None)]).await.unwrap();
        let err = insert(&store, &[user(2, "b@x", None), user(1, "c@x", None)])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.rows("users").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn declared_unique_columns_conflict() {
        let store = MemoryStore::new();
        store.unique("users", "email").unwrap();
        insert(&store, &[user(1, "a@x", None)]).await.unwrap();
        let err = insert(&store, &[user(2, "a@x", None)]).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn orders_with_nulls_last_and_stable_ties() {
        let store = MemoryStore::new();
        insert(
            &store,
            &[
                user(1, "a", Some("b")),
                user(2, "b", None),
                user(3, "c", Some("a")),
                user(4, "d", Some("b")),
            ],
        )
        .await
        .unwrap();

        assert_eq!(ids(&select(&store, Query::new().order_by("name")).await), [3, 1, 4, 2]);
        assert_eq!(ids(&select(&store, Query::new().order_by("-name")).await), [2, 1, 4, 3]);
        assert_eq!(
            ids(&select(&store, Query::new().order_by("name").offset(1).limit(2)).await),
            [1, 4]
        );
    }

    #[tokio::test]
    async fn rollback_restores_the_snapshot() {
        let store = MemoryStore::new();
        insert(&store, &[user(1, "a", None)]).await.unwrap();

        store.begin().await.unwrap();
        assert!(store.in_transaction());
        assert!(matches!(
            store.begin().await,
            Err(QuarryError::Usage(UsageError::NestedTransaction))
        ));
        insert(&store, &[user(2, "b", None)]).await.unwrap();
        store.rollback().await.unwrap();

        assert!(!store.in_transaction());
        assert_eq!(ids(&store.rows("users").unwrap()), [1]);
    }

    #[tokio::test]
    async fn update_and_delete_report_affected_rows() {
        let store = MemoryStore::new();
        insert(&store, &[user(1, "a", None), user(2, "b", None)]).await.unwrap();

        let row = user(2, "b", Some("John"));
        let update = MemoryDialect
            .render(
                &Command::Update {
                    table: "users",
                    key: "id",
                    row: &row,
                },
                &fields(),
            )
            .unwrap();
        assert_eq!(store.execute(&update).await.unwrap(), 1);

        let missing = user(9, "z", None);
        let update = MemoryDialect
            .render(
                &Command::Update {
                    table: "users",
                    key: "id",
                    row: &missing,
                },
                &fields(),
            )
            .unwrap();
        assert_eq!(store.execute(&update).await.unwrap(), 0);

        let filter = Filter::is_null("name");
        let delete = MemoryDialect
            .render(
                &Command::Delete {
                    table: "users",
                    filter: &filter,
                },
                &fields(),
            )
            .unwrap();
        assert_eq!(store.execute(&delete).await.unwrap(), 1);
        assert_eq!(ids(&store.rows("users").unwrap()), [2]);
    }
}
