//! File-backed record storage with size-based rotation

use crate::data::{RowData, Value};
use crate::{FlatError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const RECORD_EXT: &str = "json";

/// A single persisted record envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary-key value
    pub id: Value,
    /// Column name to value
    pub data: RowData,
    /// Wall-clock-derived version stamp, bumped on every write
    pub version: i64,
}

impl Record {
    pub fn new(id: Value, data: RowData, version: i64) -> Self {
        Self { id, data, version }
    }
}

/// File-based record store
///
/// Every record lives in exactly one file at a time. A write that would land
/// in a file already at or over `max_file_size` goes to a rotated sibling
/// (`<id>_<n>.json`) instead, and the outgrown file is retired once the
/// rotated write succeeds. Reads and deletes resolve the live file, so the
/// rotated layout never leaks into callers.
pub struct RecordStore {
    base_path: PathBuf,
    max_file_size: u64,
    lock: RwLock<()>,
}

impl RecordStore {
    pub fn new(base_path: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            base_path: base_path.into(),
            max_file_size,
            lock: RwLock::new(()),
        }
    }

    /// Base directory of this store (one subdirectory per table)
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Write a record, rotating to a sibling file when the live file has
    /// outgrown the configured maximum size
    pub fn write(&self, table: &str, record: &Record) -> Result<()> {
        let _guard = self.lock.write();

        let dir = self.table_dir(table);
        fs::create_dir_all(&dir).map_err(|e| io_op(table, "create directory", e))?;

        let bytes = serde_json::to_vec(record)
            .map_err(|e| FlatError::serialization(format!("record in table {table}"), e))?;

        let siblings = self.rotated_siblings(table, &record.id)?;
        let primary = self.primary_path(table, &record.id);
        let live = siblings
            .last()
            .map(|(_, path)| path.clone())
            .unwrap_or_else(|| primary.clone());

        let rotate = match fs::metadata(&live) {
            Ok(meta) => meta.len() >= self.max_file_size,
            Err(_) => false,
        };

        if !rotate {
            return fs::write(&live, &bytes).map_err(|e| io_op(table, "write record", e));
        }

        // Skip rotation slots occupied by a different record's file
        // (`user_0.json` may be the primary file of record `user_0`)
        let mut next = siblings.last().map(|(n, _)| n + 1).unwrap_or(0);
        let mut target = self.rotated_path(table, &record.id, next);
        while target.exists() && !envelope_belongs_to(&target, &record.id) {
            next += 1;
            target = self.rotated_path(table, &record.id, next);
        }
        fs::write(&target, &bytes).map_err(|e| io_op(table, "write record", e))?;

        // Retire the outgrown file(s) so exactly one live file remains
        for (_, path) in siblings {
            remove_if_exists(&path).map_err(|e| io_op(table, "retire rotated file", e))?;
        }
        remove_if_exists(&primary).map_err(|e| io_op(table, "retire rotated file", e))?;
        Ok(())
    }

    /// Read a record by id; absence is `Ok(None)`, not an error
    pub fn read(&self, table: &str, id: &Value) -> Result<Option<Record>> {
        let _guard = self.lock.read();

        let path = self.live_path(table, id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_op(table, "read record", e)),
        };

        let record = serde_json::from_slice(&bytes)
            .map_err(|e| FlatError::serialization(format!("record {id} in table {table}"), e))?;
        Ok(Some(record))
    }

    /// Delete a record; deleting a missing record is a no-op
    pub fn delete(&self, table: &str, id: &Value) -> Result<()> {
        let _guard = self.lock.write();

        for (_, path) in self.rotated_siblings(table, id)? {
            remove_if_exists(&path).map_err(|e| io_op(table, "delete record", e))?;
        }
        remove_if_exists(&self.primary_path(table, id))
            .map_err(|e| io_op(table, "delete record", e))
    }

    /// Sequentially scan every record in a table, in file-system order.
    ///
    /// A visitor error aborts the scan and propagates. Scanning a table with
    /// no directory yet is an empty scan, not an error.
    pub fn scan<F>(&self, table: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let _guard = self.lock.read();

        let dir = self.table_dir(table);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_op(table, "scan", e)),
        };

        for entry in entries {
            let entry = entry.map_err(|e| io_op(table, "scan", e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| io_op(table, "scan", e))?;
            let record: Record = serde_json::from_slice(&bytes).map_err(|e| {
                FlatError::serialization(format!("record file {} in table {table}", path.display()), e)
            })?;
            visit(record)?;
        }
        Ok(())
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.base_path.join(table)
    }

    fn primary_path(&self, table: &str, id: &Value) -> PathBuf {
        self.table_dir(table).join(format!("{id}.{RECORD_EXT}"))
    }

    fn rotated_path(&self, table: &str, id: &Value, index: u32) -> PathBuf {
        self.table_dir(table).join(format!("{id}_{index}.{RECORD_EXT}"))
    }

    /// The file a read should hit: newest rotated sibling, else primary path
    fn live_path(&self, table: &str, id: &Value) -> Result<PathBuf> {
        let siblings = self.rotated_siblings(table, id)?;
        Ok(siblings
            .last()
            .map(|(_, path)| path.clone())
            .unwrap_or_else(|| self.primary_path(table, id)))
    }

    /// Rotated sibling files for an id, sorted by rotation index
    fn rotated_siblings(&self, table: &str, id: &Value) -> Result<Vec<(u32, PathBuf)>> {
        let dir = self.table_dir(table);
        let prefix = format!("{id}_");

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_op(table, "list rotated files", e)),
        };

        let mut siblings = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_op(table, "list rotated files", e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(&format!(".{RECORD_EXT}")) else {
                continue;
            };
            if let Some(index) = stem.strip_prefix(&prefix) {
                if let Ok(index) = index.parse::<u32>() {
                    // A name like `user_2.json` is ambiguous: rotation 2 of
                    // record `user`, or the primary file of record `user_2`.
                    // Only the stored envelope id settles it.
                    if envelope_belongs_to(&entry.path(), id) {
                        siblings.push((index, entry.path()));
                    }
                }
            }
        }
        siblings.sort_by_key(|(index, _)| *index);
        Ok(siblings)
    }
}

fn io_op(table: &str, op: &'static str, source: std::io::Error) -> FlatError {
    FlatError::IoOp {
        table: table.to_string(),
        op,
        source,
    }
}

/// Whether the record envelope in `path` carries exactly this id. Unreadable
/// or undecodable files are never claimed as siblings.
fn envelope_belongs_to(path: &Path, id: &Value) -> bool {
    let Ok(bytes) = fs::read(path) else {
        return false;
    };
    match serde_json::from_slice::<Record>(&bytes) {
        Ok(record) => record.id == *id,
        Err(_) => false,
    }
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
