//! Per-table registry of named indexes

use super::{IndexKey, MemoryIndex};
use crate::data::{RowData, Value};
use crate::{FlatError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

struct NamedIndex {
    columns: Vec<String>,
    index: MemoryIndex,
}

/// Registry of named indexes for one table.
///
/// Record-wide operations (`index_record`, `remove_record`) touch every
/// registered index under a single critical section. A failure partway
/// through would leave indexes partially updated; atomicity across storage
/// and indexes, where it exists, is handled by the database orchestrator.
#[derive(Default)]
pub struct IndexManager {
    indexes: RwLock<HashMap<String, NamedIndex>>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new, empty index
    pub fn create_index(&self, name: &str, columns: Vec<String>) -> Result<()> {
        let mut indexes = self.indexes.write();
        if indexes.contains_key(name) {
            return Err(FlatError::IndexExists(name.to_string()));
        }
        indexes.insert(
            name.to_string(),
            NamedIndex {
                columns,
                index: MemoryIndex::new(),
            },
        );
        Ok(())
    }

    /// Discard a registered index
    pub fn drop_index(&self, name: &str) -> Result<()> {
        let mut indexes = self.indexes.write();
        if indexes.remove(name).is_none() {
            return Err(FlatError::IndexNotFound(name.to_string()));
        }
        Ok(())
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.read().contains_key(name)
    }

    /// Add a record's payload to every registered index
    pub fn index_record(&self, row: &RowData) -> Result<()> {
        let mut indexes = self.indexes.write();
        for named in indexes.values_mut() {
            let key = IndexKey::from_row(&named.columns, row);
            named.index.add(key, row.clone());
        }
        Ok(())
    }

    /// Add a record's payload to one index only (backfill of a new index)
    pub fn index_record_into(&self, name: &str, row: &RowData) -> Result<()> {
        let mut indexes = self.indexes.write();
        let named = indexes
            .get_mut(name)
            .ok_or_else(|| FlatError::IndexNotFound(name.to_string()))?;
        let key = IndexKey::from_row(&named.columns, row);
        named.index.add(key, row.clone());
        Ok(())
    }

    /// Remove a record's payload from every registered index
    pub fn remove_record(&self, row: &RowData) -> Result<()> {
        let mut indexes = self.indexes.write();
        for named in indexes.values_mut() {
            let key = IndexKey::from_row(&named.columns, row);
            named.index.remove(&key, row);
        }
        Ok(())
    }

    /// Remove, from every registered index, all entries belonging to the
    /// record identified by `pk_column == id`
    pub fn remove_entries_for(&self, pk_column: &str, id: &Value) {
        let mut indexes = self.indexes.write();
        for named in indexes.values_mut() {
            named.index.remove_where(pk_column, id);
        }
    }

    /// Exact-match lookup in one index
    pub fn find(&self, name: &str, key: &IndexKey) -> Result<Vec<RowData>> {
        let indexes = self.indexes.read();
        let named = indexes
            .get(name)
            .ok_or_else(|| FlatError::IndexNotFound(name.to_string()))?;
        Ok(named.index.find(key))
    }

    /// Inclusive range lookup in one index
    pub fn range(&self, name: &str, start: &IndexKey, end: &IndexKey) -> Result<Vec<RowData>> {
        let indexes = self.indexes.read();
        let named = indexes
            .get(name)
            .ok_or_else(|| FlatError::IndexNotFound(name.to_string()))?;
        Ok(named.index.range(start, end))
    }

    /// Discard all entries of every registered index
    pub fn clear(&self) {
        let mut indexes = self.indexes.write();
        for named in indexes.values_mut() {
            named.index.clear();
        }
    }
}
