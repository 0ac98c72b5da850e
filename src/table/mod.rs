//! Table metadata: schema, index descriptors, validation
//!
//! A `Table` doubles as the persisted schema document: the orchestrator
//! serializes it to JSON and stores it as an ordinary record in the reserved
//! `_schema` table.

use crate::data::{ColumnDef, RowData, Value};
use crate::{FlatError, Result};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Backing structure kind for an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    BTree,
    Hash,
}

/// Index configuration as recorded on a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Options for creating an index
#[derive(Debug, Clone)]
pub struct CreateIndexOptions {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl From<CreateIndexOptions> for IndexInfo {
    fn from(options: CreateIndexOptions) -> Self {
        IndexInfo {
            name: options.name,
            kind: options.kind,
            columns: options.columns,
            unique: options.unique,
        }
    }
}

/// A table's schema and index list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Name of the single primary-key column, derived at creation
    pub primary_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexInfo>,
    /// Epoch milliseconds
    pub created_at: i64,
    pub updated_at: i64,
    pub max_file_size: u64,
}

impl Table {
    /// Build a table, deriving the primary key from the column list.
    /// Exactly one column must carry the primary-key flag.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>, max_file_size: u64) -> Result<Self> {
        let name = name.into();
        let mut primary_key = None;
        for col in &columns {
            if col.primary_key {
                if primary_key.is_some() {
                    return Err(FlatError::InvalidPrimaryKey { table: name });
                }
                primary_key = Some(col.name.clone());
            }
        }
        let primary_key = primary_key.ok_or(FlatError::InvalidPrimaryKey {
            table: name.clone(),
        })?;

        let now = now_millis();
        Ok(Self {
            name,
            columns,
            primary_key,
            indexes: Vec::new(),
            created_at: now,
            updated_at: now,
            max_file_size,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.iter().find(|idx| idx.name == name)
    }

    /// Conventional name of the primary-key index
    pub fn primary_key_index(&self) -> String {
        format!("pk_{}", self.primary_key)
    }

    /// Validate a full row for insert: unknown columns rejected, declared
    /// column values type-checked, not-null columns required
    pub fn validate_insert(&self, row: &RowData) -> Result<()> {
        self.check_known_columns(row)?;
        for col in &self.columns {
            match row.get(&col.name) {
                Some(value) => self.check_value(col, value)?,
                None => {
                    if col.not_null {
                        return Err(FlatError::NotNullViolation {
                            column: col.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate a partial row for update: only present columns are checked
    pub fn validate_update(&self, row: &RowData) -> Result<()> {
        self.check_known_columns(row)?;
        for col in &self.columns {
            if let Some(value) = row.get(&col.name) {
                self.check_value(col, value)?;
            }
        }
        Ok(())
    }

    /// Validate a projection list; an empty list means all columns
    pub fn validate_projection(&self, columns: &[&str]) -> Result<()> {
        for name in columns {
            if !self.has_column(name) {
                return Err(FlatError::ColumnNotFound {
                    table: self.name.clone(),
                    column: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_known_columns(&self, row: &RowData) -> Result<()> {
        for name in row.keys() {
            if !self.has_column(name) {
                return Err(FlatError::ColumnNotFound {
                    table: self.name.clone(),
                    column: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_value(&self, col: &ColumnDef, value: &Value) -> Result<()> {
        match value.data_type() {
            None => {
                if col.not_null {
                    return Err(FlatError::NotNullViolation {
                        column: col.name.clone(),
                    });
                }
            }
            Some(dt) if dt != col.data_type => {
                return Err(FlatError::TypeMismatch {
                    column: col.name.clone(),
                    expected: col.data_type,
                });
            }
            Some(_) => {}
        }
        Ok(())
    }
}

/// Current wall clock, epoch milliseconds
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Current wall clock, epoch nanoseconds (record version stamps)
pub(crate) fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
