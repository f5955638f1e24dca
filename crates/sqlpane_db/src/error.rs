//! Error types for the database layer.

use thiserror::Error;

use crate::backend::BackendError;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors surfaced by providers and the database façade.
///
/// Value decode problems are not errors: they become
/// [`DecodeWarning`](crate::codec::DecodeWarning)s so one bad cell never
/// blocks a table load.
#[derive(Error, Debug)]
pub enum DbError {
    /// Cannot open or authenticate the connection.
    #[error("Connection failed ({url}): {source}")]
    ConnectionFailure {
        url: String,
        #[source]
        source: BackendError,
    },

    /// Connection string could not be understood.
    #[error("Invalid connection url: {0}")]
    InvalidUrl(String),

    /// PRAGMA / INFORMATION_SCHEMA result was unreadable.
    #[error("Failed to introspect '{table}': {message}")]
    SchemaIntrospectionFailure { table: String, message: String },

    /// A DDL statement or rebuild transaction failed and was rolled back.
    #[error("Schema modification of '{table}' failed: {source}")]
    SchemaModificationFailed {
        table: String,
        #[source]
        source: BackendError,
    },

    #[error("Table '{0}' has no primary key")]
    NoPrimaryKey(String),

    #[error("Column '{column}' not found in '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Cannot delete '{column}': it is the only column of '{table}'")]
    CannotDeleteLastColumn { table: String, column: String },

    /// Column holds duplicate values and cannot become the primary key.
    #[error("Column '{column}' of '{table}' contains duplicate values")]
    DuplicateValueViolation { table: String, column: String },

    /// An object reference has no stable logical path.
    #[error("Object reference {0} has no stable asset path")]
    UnresolvableReference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write attempted through a read-only façade.
    #[error("Read-only mode: {0}")]
    ReadOnly(String),

    /// Any other statement failure (single statements, no rollback needed).
    #[error(transparent)]
    Statement(#[from] BackendError),
}

impl DbError {
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn introspection(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaIntrospectionFailure {
            table: table.into(),
            message: msg.into(),
        }
    }

    /// Wrap an engine error raised during DDL.
    pub fn schema_modification(table: impl Into<String>, source: impl Into<BackendError>) -> Self {
        Self::SchemaModificationFailed {
            table: table.into(),
            source: source.into(),
        }
    }
}
