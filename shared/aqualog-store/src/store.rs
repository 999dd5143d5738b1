//! Persistence interface

use aqualog_core::{Page, QueryRange, Record, RecordPage, Result};
use async_trait::async_trait;
use chrono::Utc;

/// Partition-keyed record store
///
/// Every operation addresses exactly one partition. A partition that has
/// never been written behaves as an empty one.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record. Assigns the ingest time when absent and rejects a
    /// second record at the same key with `DuplicateKey`.
    async fn insert(&self, partition: &str, record: Record) -> Result<Record>;

    /// One page of matching records, key descending, plus the total match
    /// count, computed in a single round trip.
    async fn range_query(
        &self,
        partition: &str,
        range: Option<&QueryRange>,
        page: Page,
    ) -> Result<RecordPage>;

    async fn count_range(&self, partition: &str, range: Option<&QueryRange>) -> Result<u64>;

    /// The `n` most recent records, key descending
    async fn latest(&self, partition: &str, n: usize) -> Result<Vec<Record>>;

    /// Every matching record, key ascending
    async fn scan(&self, partition: &str, range: Option<&QueryRange>) -> Result<Vec<Record>>;

    /// A single record by key
    async fn get(&self, partition: &str, key: i64) -> Result<Record>;
}

/// Set the server ingest time unless the record already carries one
pub fn stamp_ingest_time(record: &mut Record) {
    if record.ingest_ms.is_none() {
        record.ingest_ms = Some(Utc::now().timestamp_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_keeps_existing_ingest_time() {
        let mut record = Record::new(1).with_ingest_ms(42);
        stamp_ingest_time(&mut record);
        assert_eq!(record.ingest_ms, Some(42));

        let mut fresh = Record::new(2);
        stamp_ingest_time(&mut fresh);
        assert!(fresh.ingest_ms.unwrap() > 0);
    }
}
