//! Flat name → value mappings exchanged between codecs and backends.

use crate::error::{QuarryError, Result};
use crate::value::{FromValue, Value};

/// An ordered set of named values.
///
/// Codecs produce rows keyed by field name; backends return rows keyed by
/// storage column. Lookups are linear, rows are small.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    #[inline]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Sets `name` to `value`, replacing any previous entry with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of [`Row::insert`].
    #[inline]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes `name` and converts it into `T`.
    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<T> {
        let position = self
            .entries
            .iter()
            .position(|(key, _)| key == name)
            .ok_or_else(|| QuarryError::Mapping(format!("column `{name}` is missing")))?;
        let (_, value) = self.entries.swap_remove(position);
        let found = value.type_name();
        T::from_value(value).map_err(|e| match e {
            QuarryError::Mapping(_) => {
                QuarryError::mapping(name, core::any::type_name::<T>(), found)
            }
            other => other,
        })
    }

    /// Converts a copy of `name` into `T`, leaving the row untouched.
    pub fn decode<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get(name)
            .cloned()
            .ok_or_else(|| QuarryError::Mapping(format!("column `{name}` is missing")))?;
        T::from_value(value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}
