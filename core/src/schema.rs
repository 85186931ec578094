//! Static field descriptors and field → column resolution.

use crate::error::{QuarryError, Result, UsageError};
use crate::row::Row;
use crate::value::Value;

/// One entity field and the storage column it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
}

impl Field {
    /// A field stored under its own name.
    #[inline]
    pub const fn new(name: &'static str) -> Self {
        Self { name, column: name }
    }

    /// Stores the field under a different column name.
    #[inline]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }
}

/// Maps entity field names to storage column names.
pub trait FieldResolver {
    /// Returns the storage column for `field`, if the field is known.
    fn lookup(&self, field: &str) -> Option<&str>;

    /// Like [`lookup`](Self::lookup), failing with [`UsageError::UnknownField`].
    fn column(&self, field: &str) -> Result<&str> {
        self.lookup(field)
            .ok_or_else(|| QuarryError::Usage(UsageError::UnknownField(field.to_owned())))
    }
}

/// The validated field set of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fields {
    fields: &'static [Field],
    key: &'static str,
}

impl Fields {
    /// Validates a descriptor list: non-empty, unique names and columns, and
    /// `key` among the names.
    pub fn new(fields: &'static [Field], key: &'static str) -> Result<Self> {
        if fields.is_empty() {
            return Err(UsageError::NoFields.into());
        }
        for (i, field) in fields.iter().enumerate() {
            let earlier = &fields[..i];
            if earlier.iter().any(|other| other.name == field.name) {
                return Err(UsageError::DuplicateField(field.name.to_owned()).into());
            }
            if earlier.iter().any(|other| other.column == field.column) {
                return Err(UsageError::DuplicateColumn(field.column.to_owned()).into());
            }
        }
        if !fields.iter().any(|field| field.name == key) {
            return Err(UsageError::MissingKey(key.to_owned()).into());
        }
        Ok(Self { fields, key })
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &'static Field> {
        self.fields.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name of the identity field.
    #[inline]
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Storage column of the identity field.
    pub fn key_column(&self) -> &'static str {
        self.fields
            .iter()
            .find(|field| field.name == self.key)
            .map_or(self.key, |field| field.column)
    }

    /// Storage columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|field| field.column)
    }

    /// Checks that a dumped row carries exactly the declared fields.
    pub fn check_row(&self, row: &Row) -> Result<()> {
        for name in row.names() {
            if self.lookup(name).is_none() {
                return Err(UsageError::UnknownField(name.to_owned()).into());
            }
        }
        for field in self.fields {
            if !row.contains(field.name) {
                return Err(UsageError::MissingField(field.name.to_owned()).into());
            }
        }
        Ok(())
    }

    /// `(column, value)` pairs of a field-keyed row, in declaration order.
    pub fn ordered<'r>(&self, row: &'r Row) -> Result<Vec<(&'static str, &'r Value)>> {
        self.fields
            .iter()
            .map(|field| {
                row.get(field.name)
                    .map(|value| (field.column, value))
                    .ok_or_else(|| QuarryError::from(UsageError::MissingField(field.name.to_owned())))
            })
            .collect()
    }

    /// Renames a field-keyed row into a column-keyed one.
    pub fn to_columns(&self, row: &Row) -> Result<Row> {
        row.iter()
            .map(|(name, value)| Ok::<_, QuarryError>((self.column(name)?, value.clone())))
            .collect()
    }

    /// Renames a column-keyed backend row into a field-keyed one.
    pub fn to_fields(&self, row: Row) -> Result<Row> {
        row.into_iter()
            .map(|(column, value)| {
                let field = self
                    .fields
                    .iter()
                    .find(|field| field.column == column)
                    .ok_or_else(|| {
                        QuarryError::Mapping(format!("unexpected column `{column}` in result"))
                    })?;
                Ok::<_, QuarryError>((field.name, value))
            })
            .collect()
    }
}

impl FieldResolver for Fields {
    fn lookup(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|candidate| candidate.name == field)
            .map(|candidate| candidate.column)
    }
}
