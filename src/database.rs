//! Database orchestrator: schema lifecycle, constraints, query planning
//!
//! The `Database` is the only component callers interact with. It owns the
//! table and index-manager registries, drives the record store and the
//! per-table indexes together, and keeps every table's schema persisted as a
//! record in the reserved `_schema` system table.

use crate::config::Config;
use crate::data::{ColumnDef, DataType, RowData, Value};
use crate::index::{IndexKey, IndexManager};
use crate::storage::{Record, RecordStore};
use crate::table::{now_millis, now_nanos, CreateIndexOptions, IndexInfo, IndexKind, Table};
use crate::{FlatError, Result};
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Reserved system table holding one schema record per table
pub const SCHEMA_TABLE: &str = "_schema";

/// In-memory registries, guarded as one unit by the database lock
struct Registry {
    tables: BTreeMap<String, Table>,
    indexes: HashMap<String, IndexManager>,
}

/// An embedded, file-backed database
pub struct Database {
    name: String,
    config: Config,
    path: PathBuf,
    store: RecordStore,
    registry: RwLock<Registry>,
}

impl Database {
    /// Open a database, initializing it on first use.
    ///
    /// A fresh database gets the `_schema` table whose own schema is the
    /// first record ever written. An existing one has every persisted table
    /// schema loaded and its in-memory indexes rebuilt from storage.
    pub fn open(name: &str, config: Config) -> Result<Database> {
        let path = config.data_dir.join(name);
        fs::create_dir_all(&path)?;

        let store = RecordStore::new(&path, config.max_file_size);
        let db = Database {
            name: name.to_string(),
            config,
            path: path.clone(),
            store,
            registry: RwLock::new(Registry {
                tables: BTreeMap::new(),
                indexes: HashMap::new(),
            }),
        };

        if path.join(SCHEMA_TABLE).exists() {
            db.load_tables()?;
        } else {
            db.initialize()?;
        }
        Ok(db)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Remove the whole database directory
    pub fn destroy(self) -> Result<()> {
        if !self.path.exists() {
            return Err(FlatError::DatabaseNotFound(self.name));
        }
        fs::remove_dir_all(&self.path)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Table operations
    // ------------------------------------------------------------------

    /// Create a table. Fails if the name exists or the column list does not
    /// carry exactly one primary-key column.
    pub fn create_table(&self, name: &str, columns: Vec<ColumnDef>) -> Result<()> {
        ensure_not_reserved(name)?;
        let mut guard = self.registry.write();
        let registry = &mut *guard;

        if registry.tables.contains_key(name) {
            return Err(FlatError::TableExists(name.to_string()));
        }

        let mut table = Table::new(name, columns, self.config.max_file_size)?;
        table.indexes.push(IndexInfo {
            name: table.primary_key_index(),
            kind: IndexKind::BTree,
            columns: vec![table.primary_key.clone()],
            unique: true,
        });
        for col in &table.columns {
            if col.unique && !col.primary_key {
                table.indexes.push(IndexInfo {
                    name: format!("idx_{}", col.name),
                    kind: IndexKind::BTree,
                    columns: vec![col.name.clone()],
                    unique: true,
                });
            }
        }

        let manager = build_manager(&table)?;
        self.persist_schema(registry, &table)?;

        debug!("created table {name}");
        registry.indexes.insert(name.to_string(), manager);
        registry.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Drop a table: removes its schema record and registry entries. Data
    /// files are reclaimed lazily, not erased here.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        ensure_not_reserved(name)?;
        let mut guard = self.registry.write();
        let registry = &mut *guard;

        if !registry.tables.contains_key(name) {
            return Err(FlatError::TableNotFound(name.to_string()));
        }

        let id = Value::Text(name.to_string());
        self.store.delete(SCHEMA_TABLE, &id)?;
        if let Some(schema_manager) = registry.indexes.get(SCHEMA_TABLE) {
            schema_manager.remove_entries_for("name", &id);
        }

        registry.tables.remove(name);
        registry.indexes.remove(name);
        debug!("dropped table {name}");
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<Table> {
        let guard = self.registry.read();
        guard
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| FlatError::TableNotFound(name.to_string()))
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.registry.read().tables.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Index operations
    // ------------------------------------------------------------------

    /// Create a secondary index and backfill it from existing records.
    ///
    /// The in-memory registration is rolled back if schema persistence or
    /// the backfill fails; this is the one multi-step operation with a
    /// guaranteed compensating action.
    pub fn create_index(&self, table_name: &str, options: CreateIndexOptions) -> Result<()> {
        ensure_not_reserved(table_name)?;
        let mut guard = self.registry.write();
        let registry = &mut *guard;

        let table = registry
            .tables
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        for col in &options.columns {
            if !table.has_column(col) {
                return Err(FlatError::ColumnNotFound {
                    table: table_name.to_string(),
                    column: col.clone(),
                });
            }
        }
        if table.index(&options.name).is_some() {
            return Err(FlatError::IndexExists(options.name.clone()));
        }

        let manager = registry
            .indexes
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        manager.create_index(&options.name, options.columns.clone())?;

        let mut updated = table.clone();
        updated.indexes.push(options.clone().into());
        updated.updated_at = now_millis();

        if let Err(e) = self.persist_schema(registry, &updated) {
            let _ = manager.drop_index(&options.name);
            return Err(e);
        }

        let backfill = self.store.scan(table_name, |record| {
            manager.index_record_into(&options.name, &record.data)
        });
        if let Err(e) = backfill {
            warn!("backfill of index {} on {table_name} failed, rolling back", options.name);
            let _ = manager.drop_index(&options.name);
            let _ = self.persist_schema(registry, table);
            return Err(e);
        }

        registry.tables.insert(table_name.to_string(), updated);
        Ok(())
    }

    /// Drop a secondary index. The primary-key index cannot be dropped.
    pub fn drop_index(&self, table_name: &str, index_name: &str) -> Result<()> {
        ensure_not_reserved(table_name)?;
        let mut guard = self.registry.write();
        let registry = &mut *guard;

        let table = registry
            .tables
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        if index_name == table.primary_key_index() {
            return Err(FlatError::CannotDropPrimaryKeyIndex(index_name.to_string()));
        }
        if table.index(index_name).is_none() {
            return Err(FlatError::IndexNotFound(index_name.to_string()));
        }

        let manager = registry
            .indexes
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        manager.drop_index(index_name)?;

        let mut updated = table.clone();
        updated.indexes.retain(|idx| idx.name != index_name);
        updated.updated_at = now_millis();
        self.persist_schema(registry, &updated)?;

        registry.tables.insert(table_name.to_string(), updated);
        Ok(())
    }

    pub fn list_indexes(&self, table_name: &str) -> Result<Vec<IndexInfo>> {
        let guard = self.registry.read();
        let table = guard
            .tables
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        Ok(table.indexes.clone())
    }

    // ------------------------------------------------------------------
    // Data operations
    // ------------------------------------------------------------------

    /// Insert a record. Inserting an id that already exists replaces the
    /// stored record (old index entries are removed first).
    pub fn insert(&self, table_name: &str, data: RowData) -> Result<()> {
        ensure_not_reserved(table_name)?;
        let guard = self.registry.write();
        let registry = &*guard;

        let table = registry
            .tables
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;

        let mut data = data;
        for col in &table.columns {
            if !data.contains_key(&col.name) {
                if let Some(default) = &col.default {
                    data.insert(col.name.clone(), default.clone());
                }
            }
        }
        table.validate_insert(&data)?;

        let id = data
            .get(&table.primary_key)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| FlatError::MissingPrimaryKey {
                column: table.primary_key.clone(),
            })?;

        let manager = registry
            .indexes
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;

        check_unique(table, manager, &data, &id)?;

        // Primary-key overwrite: drop the old version's index entries so the
        // indexes never hold both versions
        if self.store.read(table_name, &id)?.is_some() {
            manager.remove_entries_for(&table.primary_key, &id);
        }

        let record = Record::new(id.clone(), data, now_nanos());
        self.store.write(table_name, &record)?;

        if let Err(e) = manager.index_record(&record.data) {
            // Compensate the storage write; the indexing error takes priority
            if let Err(rollback) = self.store.delete(table_name, &id) {
                warn!("rollback of record {id} in {table_name} failed: {rollback}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Point-update by primary key. `where_clause` must carry the primary-key
    /// value; the primary key itself cannot be changed.
    pub fn update(&self, table_name: &str, data: RowData, where_clause: &RowData) -> Result<()> {
        ensure_not_reserved(table_name)?;
        let guard = self.registry.write();
        let registry = &*guard;

        let table = registry
            .tables
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        table.validate_update(&data)?;
        if data.contains_key(&table.primary_key) {
            return Err(FlatError::PrimaryKeyImmutable {
                table: table_name.to_string(),
            });
        }

        let id = where_clause
            .get(&table.primary_key)
            .cloned()
            .ok_or_else(|| FlatError::MissingPrimaryKey {
                column: table.primary_key.clone(),
            })?;

        let record = self
            .store
            .read(table_name, &id)?
            .ok_or_else(|| FlatError::RecordNotFound(id.to_string()))?;

        let manager = registry
            .indexes
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;

        check_unique(table, manager, &data, &id)?;

        // Two-phase: drop pre-update entries, write, re-index. A failure
        // between the phases can leave the index missing entries for this
        // record; no stronger guarantee is provided.
        manager.remove_record(&record.data)?;

        let mut merged = record.data.clone();
        for (key, value) in data {
            merged.insert(key, value);
        }
        let version = now_nanos().max(record.version + 1);
        let updated = Record::new(id, merged, version);

        self.store.write(table_name, &updated)?;
        manager.index_record(&updated.data)?;
        Ok(())
    }

    /// Delete by primary key. Deleting a missing record is a no-op.
    pub fn delete(&self, table_name: &str, where_clause: &RowData) -> Result<()> {
        ensure_not_reserved(table_name)?;
        let guard = self.registry.write();
        let registry = &*guard;

        let table = registry
            .tables
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;

        let id = where_clause
            .get(&table.primary_key)
            .cloned()
            .ok_or_else(|| FlatError::MissingPrimaryKey {
                column: table.primary_key.clone(),
            })?;

        let Some(record) = self.store.read(table_name, &id)? else {
            return Ok(());
        };

        let manager = registry
            .indexes
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        manager.remove_record(&record.data)?;
        self.store.delete(table_name, &id)
    }

    /// Query rows, choosing the cheapest access path.
    ///
    /// Planner priority, deterministic:
    /// 1. primary-key index lookup when `where_clause` constrains the
    ///    primary-key column and yields a match (short-circuits the rest of
    ///    the clause),
    /// 2. the first declared secondary index whose columns are all present in
    ///    `where_clause`, candidates re-filtered against the whole clause,
    /// 3. full sequential scan with exact-match AND semantics and inline
    ///    offset/limit pagination.
    ///
    /// `offset` skips that many matches; `limit <= 0` means unbounded. An
    /// empty `columns` list projects all columns.
    pub fn query(
        &self,
        table_name: &str,
        columns: &[&str],
        where_clause: &RowData,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RowData>> {
        let guard = self.registry.read();
        let registry = &*guard;

        let table = registry
            .tables
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;
        table.validate_projection(columns)?;

        let manager = registry
            .indexes
            .get(table_name)
            .ok_or_else(|| FlatError::TableNotFound(table_name.to_string()))?;

        let offset = offset.max(0) as usize;

        // 1. Primary-key lookup
        if let Some(id) = where_clause.get(&table.primary_key) {
            let pk_index = table.primary_key_index();
            if manager.has_index(&pk_index) {
                let rows = manager.find(&pk_index, &IndexKey::Single(id.clone()))?;
                if !rows.is_empty() {
                    let projected = rows.iter().map(|row| project(row, columns)).collect();
                    return Ok(paginate(projected, limit, offset));
                }
            }
        }

        // 2. First declared secondary index fully covered by the clause
        for info in &table.indexes {
            if info.name == table.primary_key_index() || info.columns.is_empty() {
                continue;
            }
            if !info.columns.iter().all(|col| where_clause.contains_key(col)) {
                continue;
            }
            let key = IndexKey::from_row(&info.columns, where_clause);
            let candidates = manager.find(&info.name, &key)?;
            let matched = candidates
                .into_iter()
                .filter(|row| matches_where(row, where_clause))
                .map(|row| project(&row, columns))
                .collect();
            return Ok(paginate(matched, limit, offset));
        }

        // 3. Full scan, paginating inline to bound memory
        let mut results = Vec::new();
        let mut skipped = 0usize;
        self.store.scan(table_name, |record| {
            if !matches_where(&record.data, where_clause) {
                return Ok(());
            }
            if skipped < offset {
                skipped += 1;
                return Ok(());
            }
            if limit > 0 && results.len() as i64 >= limit {
                return Ok(());
            }
            results.push(project(&record.data, columns));
            Ok(())
        })?;
        Ok(results)
    }

    // ------------------------------------------------------------------
    // Initialization and schema persistence
    // ------------------------------------------------------------------

    fn initialize(&self) -> Result<()> {
        debug!("initializing database {}", self.name);

        let mut schema_table = Table::new(
            SCHEMA_TABLE,
            vec![
                ColumnDef::new("name", DataType::Text).primary_key(true),
                ColumnDef::new("schema", DataType::Text).not_null(true),
            ],
            self.config.max_file_size,
        )?;
        schema_table.indexes.push(IndexInfo {
            name: schema_table.primary_key_index(),
            kind: IndexKind::BTree,
            columns: vec![schema_table.primary_key.clone()],
            unique: true,
        });

        let manager = build_manager(&schema_table)?;
        let record = schema_record(&schema_table)?;
        self.store.write(SCHEMA_TABLE, &record)?;
        manager.index_record(&record.data)?;

        let mut guard = self.registry.write();
        guard.indexes.insert(SCHEMA_TABLE.to_string(), manager);
        guard.tables.insert(SCHEMA_TABLE.to_string(), schema_table);
        Ok(())
    }

    fn load_tables(&self) -> Result<()> {
        let mut tables = Vec::new();
        self.store.scan(SCHEMA_TABLE, |record| {
            let Some(Value::Text(schema_json)) = record.data.get("schema") else {
                return Err(FlatError::Serialization {
                    context: format!("schema record {}", record.id),
                    message: "missing schema field".to_string(),
                });
            };
            let table: Table = serde_json::from_str(schema_json)
                .map_err(|e| FlatError::serialization(format!("schema record {}", record.id), e))?;
            tables.push(table);
            Ok(())
        })?;

        let mut guard = self.registry.write();
        for table in tables {
            let manager = build_manager(&table)?;
            // Indexes live only in memory; rebuild them from storage
            self.store
                .scan(&table.name, |record| manager.index_record(&record.data))?;
            debug!("loaded table {} with {} indexes", table.name, table.indexes.len());
            guard.indexes.insert(table.name.clone(), manager);
            guard.tables.insert(table.name.clone(), table);
        }
        Ok(())
    }

    /// Write a table's schema record and keep the `_schema` index in sync
    fn persist_schema(&self, registry: &Registry, table: &Table) -> Result<()> {
        let record = schema_record(table)?;
        self.store.write(SCHEMA_TABLE, &record)?;
        if let Some(schema_manager) = registry.indexes.get(SCHEMA_TABLE) {
            schema_manager.remove_entries_for("name", &record.id);
            schema_manager.index_record(&record.data)?;
        }
        Ok(())
    }
}

/// Build an index manager holding every index declared on the table
fn build_manager(table: &Table) -> Result<IndexManager> {
    let manager = IndexManager::new();
    for info in &table.indexes {
        manager.create_index(&info.name, info.columns.clone())?;
    }
    Ok(manager)
}

/// The `_schema` record for a table: payload `{name, schema}` with `schema`
/// the JSON rendering of the table
fn schema_record(table: &Table) -> Result<Record> {
    let schema_json = serde_json::to_string(table)
        .map_err(|e| FlatError::serialization(format!("schema of table {}", table.name), e))?;
    let mut data = RowData::new();
    data.insert("name".to_string(), Value::Text(table.name.clone()));
    data.insert("schema".to_string(), Value::Text(schema_json));
    Ok(Record::new(
        Value::Text(table.name.clone()),
        data,
        now_nanos(),
    ))
}

/// Uniqueness check for every unique non-pk column present in `data`.
/// Matches belonging to the record `id` itself are ignored so overwrites and
/// point-updates do not trip over their own entries.
fn check_unique(table: &Table, manager: &IndexManager, data: &RowData, id: &Value) -> Result<()> {
    for col in &table.columns {
        if !col.unique || col.primary_key {
            continue;
        }
        let Some(value) = data.get(&col.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let index_name = format!("idx_{}", col.name);
        if !manager.has_index(&index_name) {
            continue;
        }
        let candidates = manager.find(&index_name, &IndexKey::Single(value.clone()))?;
        if candidates
            .iter()
            .any(|row| row.get(&table.primary_key) != Some(id))
        {
            return Err(FlatError::UniqueViolation {
                column: col.name.clone(),
            });
        }
    }
    Ok(())
}

fn ensure_not_reserved(name: &str) -> Result<()> {
    if name == SCHEMA_TABLE {
        return Err(FlatError::ReservedTable(name.to_string()));
    }
    Ok(())
}

/// Exact-match AND semantics: every key in the clause must equal the row's value
fn matches_where(row: &RowData, where_clause: &RowData) -> bool {
    where_clause
        .iter()
        .all(|(key, value)| row.get(key) == Some(value))
}

/// Project a row to the requested columns; an empty list keeps all columns
fn project(row: &RowData, columns: &[&str]) -> RowData {
    if columns.is_empty() {
        return row.clone();
    }
    let mut out = RowData::new();
    for col in columns {
        if let Some(value) = row.get(*col) {
            out.insert(col.to_string(), value.clone());
        }
    }
    out
}

/// Offset/limit over materialized rows (index paths)
fn paginate(rows: Vec<RowData>, limit: i64, offset: usize) -> Vec<RowData> {
    if offset >= rows.len() {
        return Vec::new();
    }
    let end = if limit > 0 {
        rows.len().min(offset.saturating_add(limit as usize))
    } else {
        rows.len()
    };
    rows[offset..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_db(dir: &Path) -> Database {
        let config = Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        };
        Database::open("testdb", config).unwrap()
    }

    fn users_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", DataType::Int).primary_key(true),
            ColumnDef::new("name", DataType::Text),
            ColumnDef::new("age", DataType::Int),
            ColumnDef::new("email", DataType::Text).unique(true),
        ]
    }

    fn user(id: i64, name: &str, age: i64, email: &str) -> RowData {
        let mut row = RowData::new();
        row.insert("id".to_string(), Value::Int(id));
        row.insert("name".to_string(), Value::Text(name.to_string()));
        row.insert("age".to_string(), Value::Int(age));
        row.insert("email".to_string(), Value::Text(email.to_string()));
        row
    }

    fn ids(rows: &[RowData]) -> Vec<i64> {
        let mut ids: Vec<i64> = rows
            .iter()
            .map(|row| match row.get("id") {
                Some(Value::Int(i)) => *i,
                other => panic!("unexpected id {other:?}"),
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_create_table_and_metadata() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());

        db.create_table("users", users_columns()).unwrap();

        let tables = db.list_tables();
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&SCHEMA_TABLE.to_string()));

        let table = db.get_table("users").unwrap();
        assert_eq!(table.primary_key, "id");

        // pk index plus the unique-column index are auto-created
        let indexes = db.list_indexes("users").unwrap();
        let names: Vec<&str> = indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["pk_id", "idx_email"]);

        let err = db.create_table("users", users_columns());
        assert!(matches!(err, Err(FlatError::TableExists(_))));
    }

    #[test]
    fn test_create_table_requires_exactly_one_primary_key() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());

        let err = db.create_table("t", vec![ColumnDef::new("a", DataType::Int)]);
        assert!(matches!(err, Err(FlatError::InvalidPrimaryKey { .. })));
    }

    #[test]
    fn test_reserved_table_is_rejected_for_mutations() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());

        assert!(matches!(
            db.create_table(SCHEMA_TABLE, users_columns()),
            Err(FlatError::ReservedTable(_))
        ));
        assert!(matches!(
            db.insert(SCHEMA_TABLE, RowData::new()),
            Err(FlatError::ReservedTable(_))
        ));
        assert!(matches!(
            db.drop_table(SCHEMA_TABLE),
            Err(FlatError::ReservedTable(_))
        ));

        // Reads of the system table are allowed
        db.create_table("users", users_columns()).unwrap();
        let mut where_clause = RowData::new();
        where_clause.insert("name".to_string(), Value::Text("users".to_string()));
        let rows = db.query(SCHEMA_TABLE, &[], &where_clause, 0, 0).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_insert_query_round_trip() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();

        let row = user(1, "John", 30, "j@x.com");
        db.insert("users", row.clone()).unwrap();

        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(1));
        let rows = db.query("users", &[], &where_clause, 0, 0).unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_insert_requires_primary_key_value() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();

        let mut row = RowData::new();
        row.insert("name".to_string(), Value::Text("John".to_string()));
        assert!(matches!(
            db.insert("users", row),
            Err(FlatError::MissingPrimaryKey { .. })
        ));
    }

    #[test]
    fn test_primary_key_overwrite() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();

        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();
        db.insert("users", user(1, "Johnny", 31, "j@x.com")).unwrap();

        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(1));
        let rows = db.query("users", &[], &where_clause, 0, 0).unwrap();
        assert_eq!(rows.len(), 1, "overwrite must not leave stale index entries");
        assert_eq!(rows[0].get("name"), Some(&Value::Text("Johnny".into())));

        // The old email entry is gone too: reusing it elsewhere conflicts
        // with the live record only
        let err = db.insert("users", user(2, "Jane", 25, "j@x.com"));
        assert!(matches!(err, Err(FlatError::UniqueViolation { .. })));
    }

    #[test]
    fn test_unique_column_enforcement() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();

        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();
        let err = db.insert("users", user(3, "Jake", 40, "j@x.com"));
        assert!(matches!(err, Err(FlatError::UniqueViolation { .. })));

        // The rejected record must not be visible anywhere
        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(3));
        assert!(db.query("users", &[], &where_clause, 0, 0).unwrap().is_empty());
        assert!(db.query("users", &[], &RowData::new(), 0, 0).unwrap().len() == 1);
    }

    #[test]
    fn test_type_and_not_null_validation() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table(
            "t",
            vec![
                ColumnDef::new("id", DataType::Int).primary_key(true),
                ColumnDef::new("name", DataType::Text).not_null(true),
            ],
        )
        .unwrap();

        let mut row = RowData::new();
        row.insert("id".to_string(), Value::Int(1));
        row.insert("name".to_string(), Value::Int(42));
        assert!(matches!(
            db.insert("t", row),
            Err(FlatError::TypeMismatch { .. })
        ));

        let mut row = RowData::new();
        row.insert("id".to_string(), Value::Int(1));
        assert!(matches!(
            db.insert("t", row),
            Err(FlatError::NotNullViolation { .. })
        ));
    }

    #[test]
    fn test_default_value_fills_missing_column() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table(
            "t",
            vec![
                ColumnDef::new("id", DataType::Int).primary_key(true),
                ColumnDef::new("active", DataType::Bool)
                    .not_null(true)
                    .with_default(Value::Bool(true)),
            ],
        )
        .unwrap();

        let mut row = RowData::new();
        row.insert("id".to_string(), Value::Int(1));
        db.insert("t", row).unwrap();

        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(1));
        let rows = db.query("t", &[], &where_clause, 0, 0).unwrap();
        assert_eq!(rows[0].get("active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_update_by_primary_key() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();

        let mut data = RowData::new();
        data.insert("age".to_string(), Value::Int(31));
        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(1));
        db.update("users", data, &where_clause).unwrap();

        let rows = db.query("users", &["age"], &where_clause, 1, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("age"), Some(&Value::Int(31)));
        assert_eq!(rows[0].len(), 1, "projection must keep only requested columns");
    }

    #[test]
    fn test_update_errors() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();
        db.insert("users", user(2, "Jane", 25, "a@x.com")).unwrap();

        // Missing record
        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(9));
        let mut data = RowData::new();
        data.insert("age".to_string(), Value::Int(1));
        assert!(matches!(
            db.update("users", data.clone(), &where_clause),
            Err(FlatError::RecordNotFound(_))
        ));

        // Where clause without the primary key
        let mut bad_where = RowData::new();
        bad_where.insert("age".to_string(), Value::Int(30));
        assert!(matches!(
            db.update("users", data, &bad_where),
            Err(FlatError::MissingPrimaryKey { .. })
        ));

        // Changing the primary key
        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(1));
        let mut data = RowData::new();
        data.insert("id".to_string(), Value::Int(5));
        assert!(matches!(
            db.update("users", data, &where_clause),
            Err(FlatError::PrimaryKeyImmutable { .. })
        ));

        // Updating a unique column into a taken value
        let mut data = RowData::new();
        data.insert("email".to_string(), Value::Text("a@x.com".to_string()));
        assert!(matches!(
            db.update("users", data, &where_clause),
            Err(FlatError::UniqueViolation { .. })
        ));

        // Re-writing a record's own unique value is fine
        let mut data = RowData::new();
        data.insert("email".to_string(), Value::Text("j@x.com".to_string()));
        db.update("users", data, &where_clause).unwrap();
    }

    #[test]
    fn test_delete_then_query() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();

        let mut where_clause = RowData::new();
        where_clause.insert("id".to_string(), Value::Int(1));
        db.delete("users", &where_clause).unwrap();

        assert!(db.query("users", &[], &where_clause, 0, 0).unwrap().is_empty());

        // Deleting again is not an error, and the email is free again
        db.delete("users", &where_clause).unwrap();
        db.insert("users", user(2, "Jane", 25, "j@x.com")).unwrap();
    }

    #[test]
    fn test_secondary_index_scenario() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.create_index(
            "users",
            CreateIndexOptions {
                name: "idx_age".to_string(),
                kind: IndexKind::BTree,
                columns: vec!["age".to_string()],
                unique: false,
            },
        )
        .unwrap();

        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();
        db.insert("users", user(2, "Jane", 30, "a@x.com")).unwrap();

        let mut where_clause = RowData::new();
        where_clause.insert("age".to_string(), Value::Int(30));
        let rows = db
            .query("users", &["id", "name"], &where_clause, 0, 0)
            .unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);
        for row in &rows {
            assert_eq!(row.len(), 2);
        }
    }

    #[test]
    fn test_create_index_backfills_existing_records() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();
        db.insert("users", user(2, "Jane", 25, "a@x.com")).unwrap();

        db.create_index(
            "users",
            CreateIndexOptions {
                name: "idx_age".to_string(),
                kind: IndexKind::BTree,
                columns: vec!["age".to_string()],
                unique: false,
            },
        )
        .unwrap();

        let mut where_clause = RowData::new();
        where_clause.insert("age".to_string(), Value::Int(30));
        let rows = db.query("users", &[], &where_clause, 0, 0).unwrap();
        assert_eq!(ids(&rows), vec![1]);
    }

    #[test]
    fn test_index_path_equals_full_scan() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        for i in 0..20 {
            db.insert("users", user(i, "user", i % 4, &format!("u{i}@x.com")))
                .unwrap();
        }

        let mut where_clause = RowData::new();
        where_clause.insert("age".to_string(), Value::Int(2));

        // No index on age yet: full scan
        let scanned = db.query("users", &[], &where_clause, 0, 0).unwrap();

        db.create_index(
            "users",
            CreateIndexOptions {
                name: "idx_age".to_string(),
                kind: IndexKind::BTree,
                columns: vec!["age".to_string()],
                unique: false,
            },
        )
        .unwrap();
        let indexed = db.query("users", &[], &where_clause, 0, 0).unwrap();

        assert_eq!(ids(&scanned), ids(&indexed));
        assert_eq!(ids(&indexed), vec![2, 6, 10, 14, 18]);
    }

    #[test]
    fn test_index_errors() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();

        let err = db.create_index(
            "users",
            CreateIndexOptions {
                name: "idx_nope".to_string(),
                kind: IndexKind::BTree,
                columns: vec!["nope".to_string()],
                unique: false,
            },
        );
        assert!(matches!(err, Err(FlatError::ColumnNotFound { .. })));

        let err = db.create_index(
            "users",
            CreateIndexOptions {
                name: "idx_email".to_string(),
                kind: IndexKind::BTree,
                columns: vec!["email".to_string()],
                unique: true,
            },
        );
        assert!(matches!(err, Err(FlatError::IndexExists(_))));

        assert!(matches!(
            db.drop_index("users", "pk_id"),
            Err(FlatError::CannotDropPrimaryKeyIndex(_))
        ));
        assert!(matches!(
            db.drop_index("users", "idx_nope"),
            Err(FlatError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_drop_index_falls_back_to_scan() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();

        db.drop_index("users", "idx_email").unwrap();
        assert!(db.get_table("users").unwrap().index("idx_email").is_none());

        let mut where_clause = RowData::new();
        where_clause.insert("email".to_string(), Value::Text("j@x.com".to_string()));
        let rows = db.query("users", &[], &where_clause, 0, 0).unwrap();
        assert_eq!(ids(&rows), vec![1]);
    }

    #[test]
    fn test_pagination_formula() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        for i in 0..10 {
            db.insert("users", user(i, "user", 30, &format!("u{i}@x.com")))
                .unwrap();
        }

        let mut where_clause = RowData::new();
        where_clause.insert("age".to_string(), Value::Int(30));

        // Full-scan path
        assert_eq!(db.query("users", &[], &where_clause, 3, 0).unwrap().len(), 3);
        assert_eq!(db.query("users", &[], &where_clause, 5, 8).unwrap().len(), 2);
        assert_eq!(db.query("users", &[], &where_clause, 0, 0).unwrap().len(), 10);
        assert_eq!(db.query("users", &[], &where_clause, -1, 0).unwrap().len(), 10);
        assert!(db.query("users", &[], &where_clause, 3, 10).unwrap().is_empty());

        // Index path applies the same formula
        db.create_index(
            "users",
            CreateIndexOptions {
                name: "idx_age".to_string(),
                kind: IndexKind::BTree,
                columns: vec!["age".to_string()],
                unique: false,
            },
        )
        .unwrap();
        assert_eq!(db.query("users", &[], &where_clause, 3, 0).unwrap().len(), 3);
        assert_eq!(db.query("users", &[], &where_clause, 5, 8).unwrap().len(), 2);
        assert!(db.query("users", &[], &where_clause, 3, 10).unwrap().is_empty());

        // limit near i64::MAX with a nonzero offset must not overflow
        let rows = db.query("users", &[], &where_clause, i64::MAX, 1).unwrap();
        assert_eq!(rows.len(), 9);
    }

    #[test]
    fn test_projection_unknown_column_is_error() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();

        let err = db.query("users", &["nope"], &RowData::new(), 0, 0);
        assert!(matches!(err, Err(FlatError::ColumnNotFound { .. })));
    }

    #[test]
    fn test_drop_table() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.drop_table("users").unwrap();

        assert!(matches!(
            db.get_table("users"),
            Err(FlatError::TableNotFound(_))
        ));
        assert!(matches!(
            db.drop_table("users"),
            Err(FlatError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_reopen_restores_schemas_and_indexes() {
        let dir = tempdir().unwrap();
        {
            let db = open_db(dir.path());
            db.create_table("users", users_columns()).unwrap();
            db.create_index(
                "users",
                CreateIndexOptions {
                    name: "idx_age".to_string(),
                    kind: IndexKind::BTree,
                    columns: vec!["age".to_string()],
                    unique: false,
                },
            )
            .unwrap();
            db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();
            db.insert("users", user(2, "Jane", 30, "a@x.com")).unwrap();
        }

        let db = open_db(dir.path());
        let table = db.get_table("users").unwrap();
        assert_eq!(table.primary_key, "id");
        assert!(table.index("idx_age").is_some());

        // Index-backed query works after reopen: indexes were rebuilt
        let mut where_clause = RowData::new();
        where_clause.insert("age".to_string(), Value::Int(30));
        let rows = db.query("users", &[], &where_clause, 0, 0).unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);

        // Unique constraints survive reopen too
        let err = db.insert("users", user(3, "Jake", 40, "j@x.com"));
        assert!(matches!(err, Err(FlatError::UniqueViolation { .. })));
    }

    #[test]
    fn test_destroy_removes_database_directory() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        let path = db.path().to_path_buf();
        assert!(path.exists());
        db.destroy().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_end_to_end_user_workflow() {
        let dir = tempdir().unwrap();
        let db = open_db(dir.path());
        db.create_table("users", users_columns()).unwrap();
        db.create_index(
            "users",
            CreateIndexOptions {
                name: "idx_age".to_string(),
                kind: IndexKind::BTree,
                columns: vec!["age".to_string()],
                unique: false,
            },
        )
        .unwrap();

        db.insert("users", user(1, "John", 30, "j@x.com")).unwrap();
        db.insert("users", user(2, "Jane", 30, "a@x.com")).unwrap();

        let mut by_age = RowData::new();
        by_age.insert("age".to_string(), Value::Int(30));
        let rows = db.query("users", &["id", "name"], &by_age, 0, 0).unwrap();
        assert_eq!(ids(&rows), vec![1, 2]);

        let err = db.insert("users", user(3, "Jack", 20, "j@x.com"));
        assert!(matches!(err, Err(FlatError::UniqueViolation { .. })));

        let mut data = RowData::new();
        data.insert("age".to_string(), Value::Int(31));
        let mut by_id = RowData::new();
        by_id.insert("id".to_string(), Value::Int(1));
        db.update("users", data, &by_id).unwrap();

        let rows = db.query("users", &["age"], &by_id, 1, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("age"), Some(&Value::Int(31)));
    }
}
