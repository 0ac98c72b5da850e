//! Column definitions

use super::{DataType, Value};
use serde::{Deserialize, Serialize};

/// Column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name (unique within a table)
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether this column is the table's primary key
    #[serde(default)]
    pub primary_key: bool,
    /// Whether the column rejects null / missing values
    #[serde(default)]
    pub not_null: bool,
    /// Whether values must be unique across the table
    #[serde(default)]
    pub unique: bool,
    /// Default value applied when the column is absent from inserted data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ColumnDef {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    /// Set primary-key flag
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Set not-null flag
    pub fn not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    /// Set unique flag
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Set default value
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}
