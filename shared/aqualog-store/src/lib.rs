//! Aqualog Record Store
//!
//! One logical partition per device. Records are keyed by their device
//! timestamp and are immutable once written. Provides:
//! - the `RecordStore` persistence interface
//! - an in-memory store for embedded use and tests
//! - a PostgreSQL wire-protocol store with connection pooling
//! - the `PartitionDirectory` group -> partition lookup

mod directory;
mod memory;
mod pool;
mod postgres;
mod store;

pub use directory::{PartitionDirectory, StaticDirectory};
pub use memory::MemoryStore;
pub use pool::{PgPool, PoolConfig, PoolStats};
pub use postgres::PgRecordStore;
pub use store::{stamp_ingest_time, RecordStore};
