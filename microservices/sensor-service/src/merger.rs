//! Multi-partition query merger
//!
//! Failure policy per operation:
//! - `list_by_group` fails fast; an exact total is meaningless with a
//!   partition missing.
//! - `latest_by_group` skips failing partitions and reports them in
//!   `omitted`.

use std::sync::Arc;

use aqualog_core::{Page, QueryRange, RecordPage, Result, TaggedRecord};
use aqualog_store::RecordStore;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::fanout::FanOut;

/// Most recent record of each partition in a group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupLatest {
    pub records: Vec<TaggedRecord>,
    /// Partitions that returned a record
    pub total: u64,
    /// Partitions left out because their call failed
    pub omitted: Vec<String>,
}

pub struct QueryMerger {
    store: Arc<dyn RecordStore>,
    fanout: FanOut,
}

impl QueryMerger {
    pub fn new(store: Arc<dyn RecordStore>, fanout: FanOut) -> Self {
        Self { store, fanout }
    }

    /// Union of the same range query over every partition, paginated once
    /// over the merged set.
    ///
    /// Each partition supplies at most `skip + limit` rows, which is enough
    /// for the global page to be exact. Ties on the key keep partition order.
    #[instrument(skip(self, partitions), fields(partitions = partitions.len()))]
    pub async fn list_by_group(
        &self,
        partitions: &[String],
        range: Option<&QueryRange>,
        page: Page,
        deadline: Option<Instant>,
    ) -> Result<RecordPage<TaggedRecord>> {
        if let Some(range) = range {
            range.validate()?;
        }
        if partitions.is_empty() {
            return Ok(RecordPage::empty());
        }

        let window = Page {
            skip: 0,
            limit: page.window(),
        };
        let pages = self
            .fanout
            .try_all(partitions, deadline, |partition| {
                let store = Arc::clone(&self.store);
                async move { store.range_query(&partition, range, window).await }
            })
            .await?;

        let mut total = 0u64;
        let mut merged = Vec::new();
        for (partition, part) in pages {
            total += part.total;
            merged.extend(part.records.into_iter().map(|record| TaggedRecord {
                partition: partition.clone(),
                record,
            }));
        }
        merged.sort_by(|a, b| b.record.key.cmp(&a.record.key));

        let records: Vec<_> = merged
            .into_iter()
            .skip(page.skip)
            .take(page.limit)
            .collect();
        debug!(returned = records.len(), total, "Group page merged");
        Ok(RecordPage { records, total })
    }

    /// Latest record of every partition, newest first, unpaginated
    #[instrument(skip(self, partitions), fields(partitions = partitions.len()))]
    pub async fn latest_by_group(
        &self,
        partitions: &[String],
        deadline: Option<Instant>,
    ) -> GroupLatest {
        if partitions.is_empty() {
            return GroupLatest::default();
        }

        let (settled, omitted) = self
            .fanout
            .settle_all(partitions, deadline, |partition| {
                let store = Arc::clone(&self.store);
                async move { store.latest(&partition, 1).await }
            })
            .await;

        let mut records: Vec<TaggedRecord> = settled
            .into_iter()
            .filter_map(|(partition, mut latest)| {
                latest.truncate(1);
                latest
                    .pop()
                    .map(|record| TaggedRecord { partition, record })
            })
            .collect();
        records.sort_by(|a, b| b.record.key.cmp(&a.record.key));

        GroupLatest {
            total: records.len() as u64,
            records,
            omitted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqualog_core::Record;
    use aqualog_store::MemoryStore;

    async fn seeded() -> (MemoryStore, QueryMerger) {
        let store = MemoryStore::new();
        for key in [10, 30, 50] {
            store.insert("a", Record::new(key)).await.unwrap();
        }
        for key in [20, 40] {
            store.insert("b", Record::new(key)).await.unwrap();
        }
        let merger = QueryMerger::new(Arc::new(store.clone()), FanOut::default());
        (store, merger)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_list_by_group_paginates_merged_set() {
        let (_, merger) = seeded().await;
        let page = merger
            .list_by_group(&keys(&["a", "b"]), None, Page::new(Some(1), Some(3)), None)
            .await
            .unwrap();
        let got: Vec<_> = page
            .records
            .iter()
            .map(|r| (r.partition.as_str(), r.record.key))
            .collect();
        assert_eq!(got, vec![("b", 40), ("a", 30), ("b", 20)]);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn test_list_by_group_respects_range() {
        let (_, merger) = seeded().await;
        let range = QueryRange::new(15, 45).unwrap();
        let page = merger
            .list_by_group(&keys(&["a", "b"]), Some(&range), Page::default(), None)
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.records[0].record.key, 40);
    }

    #[tokio::test]
    async fn test_empty_group() {
        let (_, merger) = seeded().await;
        let page = merger
            .list_by_group(&[], None, Page::default(), None)
            .await
            .unwrap();
        assert_eq!(page, RecordPage::empty());
        assert_eq!(merger.latest_by_group(&[], None).await, GroupLatest::default());
    }

    #[tokio::test]
    async fn test_latest_by_group_skips_empty_partitions() {
        let (_, merger) = seeded().await;
        let latest = merger
            .latest_by_group(&keys(&["b", "never-written", "a"]), None)
            .await;
        let got: Vec<_> = latest
            .records
            .iter()
            .map(|r| (r.partition.as_str(), r.record.key))
            .collect();
        assert_eq!(got, vec![("a", 50), ("b", 40)]);
        assert_eq!(latest.total, 2);
        assert!(latest.omitted.is_empty());
    }
}
