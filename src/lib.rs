//! Flatbase Storage Engine
//!
//! An embedded, file-backed tabular storage engine. Tables of typed records
//! are persisted one file per record, secondary indexes are kept in memory,
//! and queries are answered through a planner that picks between primary-key
//! lookup, secondary-index lookup, and full sequential scan.

pub mod config;
pub mod data;
pub mod database;
pub mod index;
pub mod query;
pub mod storage;
pub mod table;

// Re-export main types
pub use config::Config;
pub use data::{ColumnDef, DataType, RowData, Value};
pub use database::Database;
pub use index::{IndexKey, IndexManager, MemoryIndex};
pub use query::{CompareOp, Condition, Query};
pub use storage::{Record, RecordStore};
pub use table::{CreateIndexOptions, IndexInfo, IndexKind, Table};

/// Storage engine error type
#[derive(Debug, thiserror::Error)]
pub enum FlatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error during {op} on table {table}: {source}")]
    IoOp {
        table: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {context}: {message}")]
    Serialization { context: String, message: String },

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Column not found in table {table}: {column}")]
    ColumnNotFound { table: String, column: String },

    #[error("Table name is reserved: {0}")]
    ReservedTable(String),

    #[error("Table {table} must have exactly one primary key column")]
    InvalidPrimaryKey { table: String },

    #[error("Primary key column {column} is required")]
    MissingPrimaryKey { column: String },

    #[error("Primary key of table {table} cannot be updated")]
    PrimaryKeyImmutable { table: String },

    #[error("Column {column} cannot be null")]
    NotNullViolation { column: String },

    #[error("Invalid data type for column {column}: expected {expected}")]
    TypeMismatch { column: String, expected: DataType },

    #[error("Unique constraint violation for column {column}")]
    UniqueViolation { column: String },

    #[error("Cannot drop primary key index {0}")]
    CannotDropPrimaryKeyIndex(String),
}

impl FlatError {
    /// Wrap a serialization failure with a context string
    pub(crate) fn serialization(context: impl Into<String>, err: serde_json::Error) -> Self {
        FlatError::Serialization {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlatError>;
