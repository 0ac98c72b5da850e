//! Index module - in-memory secondary indexes
//!
//! Indexes map a (possibly composite) key to point-in-time copies of record
//! payloads. They never touch disk; the orchestrator rebuilds them from
//! storage when a database is opened.

mod manager;
mod memory;

pub use manager::IndexManager;
pub use memory::{IndexEntry, IndexKey, MemoryIndex};
