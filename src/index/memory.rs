//! Sorted in-memory index over record payloads

use crate::data::{RowData, Value};
use std::cmp::Ordering;

/// An index key: one column's value, or an ordered tuple for composite indexes
#[derive(Debug, Clone, PartialEq)]
pub enum IndexKey {
    Single(Value),
    Composite(Vec<Value>),
}

impl IndexKey {
    /// Build the key for a record from the index's column list.
    /// Missing columns key as null.
    pub fn from_row(columns: &[String], row: &RowData) -> Self {
        if columns.len() == 1 {
            IndexKey::Single(row.get(&columns[0]).cloned().unwrap_or(Value::Null))
        } else {
            IndexKey::Composite(
                columns
                    .iter()
                    .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                    .collect(),
            )
        }
    }

    /// Element-wise three-way comparison with `Value::cmp_key` semantics.
    /// Shape mismatches compare `Equal`, like type mismatches do.
    pub fn cmp_key(&self, other: &IndexKey) -> Ordering {
        match (self, other) {
            (IndexKey::Single(a), IndexKey::Single(b)) => a.cmp_key(b),
            (IndexKey::Composite(a), IndexKey::Composite(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    let ord = left.cmp_key(right);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            }
            _ => Ordering::Equal,
        }
    }
}

/// A single index entry: key plus a copy of the full record payload at the
/// time of indexing
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub key: IndexKey,
    pub row: RowData,
}

/// A sorted vector of index entries.
///
/// Entries are kept ordered by `IndexKey::cmp_key` as an aid for range
/// queries; exact-match lookup is a linear scan using structural equality.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: Vec<IndexEntry>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, keeping the entry list sorted
    pub fn add(&mut self, key: IndexKey, row: RowData) {
        self.entries.push(IndexEntry { key, row });
        self.entries.sort_by(|a, b| a.key.cmp_key(&b.key));
    }

    /// Remove one entry matching the key. When several entries share the key,
    /// the one holding the given payload is preferred.
    pub fn remove(&mut self, key: &IndexKey, row: &RowData) {
        let position = self
            .entries
            .iter()
            .position(|e| e.key == *key && e.row == *row)
            .or_else(|| self.entries.iter().position(|e| e.key == *key));
        if let Some(position) = position {
            self.entries.remove(position);
        }
    }

    /// Remove every entry whose payload carries the given value in `column`
    pub fn remove_where(&mut self, column: &str, value: &Value) {
        self.entries.retain(|e| e.row.get(column) != Some(value));
    }

    /// All payloads whose key is structurally equal to `key`
    pub fn find(&self, key: &IndexKey) -> Vec<RowData> {
        self.entries
            .iter()
            .filter(|e| e.key == *key)
            .map(|e| e.row.clone())
            .collect()
    }

    /// All payloads whose key falls within `[start, end]` inclusive
    pub fn range(&self, start: &IndexKey, end: &IndexKey) -> Vec<RowData> {
        self.entries
            .iter()
            .filter(|e| {
                e.key.cmp_key(start) != Ordering::Less && e.key.cmp_key(end) != Ordering::Greater
            })
            .map(|e| e.row.clone())
            .collect()
    }

    /// Discard all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
