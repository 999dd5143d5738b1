//! Group -> partition directory

use aqualog_core::{AquaError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves an organisational group to the ordered partition keys of its devices
///
/// The returned order decides which partition is treated as first when
/// merging; it carries no other meaning.
#[async_trait]
pub trait PartitionDirectory: Send + Sync {
    async fn partitions_for_group(&self, group_id: &str) -> Result<Vec<String>>;
}

/// Directory held in memory, loaded by the owner of the group catalogue
#[derive(Clone, Default)]
pub struct StaticDirectory {
    groups: Arc<DashMap<String, Vec<String>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the partition list of a group
    pub fn assign<I, S>(&self, group_id: &str, partitions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let partitions: Vec<String> = partitions.into_iter().map(Into::into).collect();
        debug!(group_id, partitions = partitions.len(), "Group assigned");
        self.groups.insert(group_id.to_string(), partitions);
    }

    pub fn remove(&self, group_id: &str) -> Option<Vec<String>> {
        self.groups.remove(group_id).map(|(_, v)| v)
    }
}

#[async_trait]
impl PartitionDirectory for StaticDirectory {
    async fn partitions_for_group(&self, group_id: &str) -> Result<Vec<String>> {
        self.groups
            .get(group_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| AquaError::NotFound(format!("group {}", group_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assign_preserves_order() {
        let directory = StaticDirectory::new();
        directory.assign("dam-north", ["box-3", "box-1", "box-2"]);

        let partitions = directory.partitions_for_group("dam-north").await.unwrap();
        assert_eq!(partitions, vec!["box-3", "box-1", "box-2"]);
    }

    #[tokio::test]
    async fn test_unknown_group() {
        let directory = StaticDirectory::new();
        assert!(matches!(
            directory.partitions_for_group("missing").await,
            Err(AquaError::NotFound(_))
        ));
    }
}
