use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuarryError {
    /// No rows matched when exactly one was expected
    #[error("No rows found")]
    NotFound,

    /// A single-result query matched more than one row
    #[error("Query error: {0}")]
    Query(String),

    /// Uniqueness or other constraint violation on write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller misused the API (unknown field, malformed filter, bad transaction state)
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// A stored value could not be converted into the requested type
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Backend or transport failure, propagated unchanged
    #[error("Execution error: {0}")]
    Execution(String),
}

impl QuarryError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    #[inline]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    pub(crate) fn mapping(column: &str, expected: &str, found: &str) -> Self {
        Self::Mapping(format!(
            "column `{column}`: expected {expected}, found {found}"
        ))
    }
}

/// Programming errors surfaced before anything reaches a backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("field `{0}` is missing from the dumped row")]
    MissingField(String),

    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("storage column `{0}` is mapped by more than one field")]
    DuplicateColumn(String),

    #[error("identity field `{0}` is not among the declared fields")]
    MissingKey(String),

    #[error("entity declares no fields")]
    NoFields,

    #[error("malformed filter: {0}")]
    MalformedFilter(String),

    #[error("cannot {action} a transaction that is {state}")]
    TransactionState {
        action: &'static str,
        state: &'static str,
    },

    #[error("nested transactions are not supported")]
    NestedTransaction,

    #[error("statement cannot be {0}")]
    UnsupportedStatement(&'static str),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, QuarryError>;
