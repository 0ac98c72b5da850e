//! Storage module - durable per-record file persistence
//!
//! One directory per table, one JSON envelope file per record. The store has
//! no knowledge of schemas or indexes; it only reads and writes envelopes.

mod record_store;

pub use record_store::{Record, RecordStore};
