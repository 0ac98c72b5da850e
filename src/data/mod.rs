//! Data model: typed values and column definitions

mod column;
mod value;

pub use column::ColumnDef;
pub use value::{DataType, Value};

use std::collections::BTreeMap;

/// A record's payload: column name to value
pub type RowData = BTreeMap<String, Value>;
