//! Query descriptors: filter, ordering and paging for multi-record reads.

use crate::error::Result;
use crate::filter::Filter;
use crate::schema::FieldResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ordering key.
///
/// Converting from a string accepts the `-field` shorthand for descending order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

impl From<&str> for OrderBy {
    fn from(key: &str) -> Self {
        match key.strip_prefix('-') {
            Some(field) => Self::desc(field),
            None => Self::asc(key),
        }
    }
}

impl From<String> for OrderBy {
    fn from(key: String) -> Self {
        Self::from(key.as_str())
    }
}

impl<F: Into<String>> From<(F, Direction)> for OrderBy {
    fn from((field, direction): (F, Direction)) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Which records to read, in which order, and how many.
///
/// ```
/// use quarry_core::{Filter, Query};
///
/// let query = Query::new()
///     .filter(Filter::starts_with("name", "B"))
///     .order_by("-created")
///     .page(2, 20);
/// assert_eq!((query.limit, query.offset), (Some(20), Some(20)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// ANDs `filter` onto the current filter.
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        let current = core::mem::take(&mut self.filter);
        self.filter = current & filter.into();
        self
    }

    /// Appends an ordering key; earlier keys take precedence.
    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.order.push(order.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// One-based page of `per_page` records. Page `0` is treated as page `1`.
    pub fn page(self, page: u64, per_page: u64) -> Self {
        let skipped = page.saturating_sub(1).saturating_mul(per_page);
        self.limit(per_page).offset(skipped)
    }

    /// Checks the filter and every ordering key against `fields`.
    pub fn validate(&self, fields: &dyn FieldResolver) -> Result<()> {
        self.filter.validate(fields)?;
        for order in &self.order {
            fields.column(&order.field)?;
        }
        Ok(())
    }
}

impl From<Filter> for Query {
    fn from(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}
