//! In-memory record store

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use aqualog_core::{AquaError, Page, QueryRange, Record, RecordPage, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::store::{stamp_ingest_time, RecordStore};

type Partition = Arc<RwLock<BTreeMap<i64, Record>>>;

/// Record store backed by one ordered map per partition
#[derive(Clone, Default)]
pub struct MemoryStore {
    partitions: Arc<DashMap<String, Partition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions created so far
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    // Clone the handle out so the shard lock is released before the partition lock is taken
    fn partition(&self, key: &str) -> Option<Partition> {
        self.partitions.get(key).map(|p| p.value().clone())
    }

    fn read_range<T>(
        &self,
        partition: &str,
        range: Option<&QueryRange>,
        f: impl FnOnce(std::collections::btree_map::Range<'_, i64, Record>) -> T,
        empty: T,
    ) -> Result<T> {
        if let Some(range) = range {
            range.validate()?;
        }
        let Some(part) = self.partition(partition) else {
            return Ok(empty);
        };
        let (start, end) = QueryRange::bounds_of(range);
        let guard = part.read();
        let out = f(guard.range(start..=end));
        Ok(out)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, partition: &str, mut record: Record) -> Result<Record> {
        stamp_ingest_time(&mut record);

        let part = self
            .partitions
            .entry(partition.to_string())
            .or_default()
            .value()
            .clone();

        let mut guard = part.write();
        match guard.entry(record.key) {
            Entry::Occupied(_) => Err(AquaError::DuplicateKey {
                partition: partition.to_string(),
                key: record.key,
            }),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                debug!(partition, key = record.key, "Record inserted");
                Ok(record)
            }
        }
    }

    async fn range_query(
        &self,
        partition: &str,
        range: Option<&QueryRange>,
        page: Page,
    ) -> Result<RecordPage> {
        self.read_range(
            partition,
            range,
            |matched| {
                let total = matched.clone().count() as u64;
                let records = matched
                    .rev()
                    .skip(page.skip)
                    .take(page.limit)
                    .map(|(_, r)| r.clone())
                    .collect();
                RecordPage { records, total }
            },
            RecordPage::empty(),
        )
    }

    async fn count_range(&self, partition: &str, range: Option<&QueryRange>) -> Result<u64> {
        self.read_range(partition, range, |matched| matched.count() as u64, 0)
    }

    async fn latest(&self, partition: &str, n: usize) -> Result<Vec<Record>> {
        self.read_range(
            partition,
            None,
            |all| all.rev().take(n).map(|(_, r)| r.clone()).collect(),
            Vec::new(),
        )
    }

    async fn scan(&self, partition: &str, range: Option<&QueryRange>) -> Result<Vec<Record>> {
        self.read_range(
            partition,
            range,
            |matched| matched.map(|(_, r)| r.clone()).collect(),
            Vec::new(),
        )
    }

    async fn get(&self, partition: &str, key: i64) -> Result<Record> {
        self.partition(partition)
            .and_then(|part| {
                let guard = part.read();
                guard.get(&key).cloned()
            })
            .ok_or_else(|| AquaError::NotFound(format!("record {} in partition {}", key, partition)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(keys: &[i64]) -> MemoryStore {
        let store = MemoryStore::new();
        for &key in keys {
            store
                .insert("box-1", Record::new(key).with_metric("WAU", key as f64))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_insert_assigns_ingest_time() {
        let store = MemoryStore::new();
        let stored = store.insert("box-1", Record::new(100)).await.unwrap();
        assert!(stored.ingest_ms.is_some());
        assert_eq!(store.partition_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected_and_original_kept() {
        let store = MemoryStore::new();
        store
            .insert("box-1", Record::new(100).with_metric("WAU", 1.0))
            .await
            .unwrap();

        let err = store
            .insert("box-1", Record::new(100).with_metric("WAU", 9.0))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AquaError::DuplicateKey {
                partition: "box-1".to_string(),
                key: 100
            }
        );

        let kept = store.get("box-1", 100).await.unwrap();
        assert_eq!(kept.metric("WAU"), Some(1.0));
    }

    #[tokio::test]
    async fn test_same_key_in_other_partition_is_fine() {
        let store = MemoryStore::new();
        store.insert("box-1", Record::new(100)).await.unwrap();
        assert!(store.insert("box-2", Record::new(100)).await.is_ok());
    }

    #[tokio::test]
    async fn test_range_query_sorted_desc_with_total() {
        let store = seeded(&[10, 20, 30, 40, 50]).await;
        let range = QueryRange::new(20, 50).unwrap();

        let page = store
            .range_query("box-1", Some(&range), Page::new(Some(1), Some(2)))
            .await
            .unwrap();

        assert_eq!(page.total, 4);
        let keys: Vec<i64> = page.records.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![40, 30]);
    }

    #[tokio::test]
    async fn test_range_query_past_end_keeps_total() {
        let store = seeded(&[10, 20]).await;
        let page = store
            .range_query("box-1", None, Page::new(Some(5), None))
            .await
            .unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_unknown_partition_is_empty() {
        let store = MemoryStore::new();
        let page = store.range_query("nope", None, Page::default()).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(store.count_range("nope", None).await.unwrap(), 0);
        assert!(store.latest("nope", 1).await.unwrap().is_empty());
        assert!(matches!(store.get("nope", 1).await, Err(AquaError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_range_rejected() {
        let store = seeded(&[10]).await;
        let bad = QueryRange { start: 50, end: 10 };
        assert_eq!(
            store.count_range("box-1", Some(&bad)).await,
            Err(AquaError::InvalidRange { start: 50, end: 10 })
        );
    }

    #[tokio::test]
    async fn test_latest_and_scan_ordering() {
        let store = seeded(&[30, 10, 20]).await;

        let latest: Vec<i64> = store
            .latest("box-1", 2)
            .await
            .unwrap()
            .iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(latest, vec![30, 20]);

        let scanned: Vec<i64> = store
            .scan("box-1", None)
            .await
            .unwrap()
            .iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(scanned, vec![10, 20, 30]);
    }
}
