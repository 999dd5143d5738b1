//! Range and pagination types shared by single- and multi-partition queries

use serde::{Deserialize, Serialize};

use crate::domain::Record;
use crate::error::{AquaError, Result};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 1000;

/// Inclusive `[start, end]` bound on the record key (epoch seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRange {
    pub start: i64,
    pub end: i64,
}

impl QueryRange {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Parse the `time=[start, end]` wire form; any other arity means unbounded
    pub fn from_bounds(bounds: &[i64]) -> Result<Option<Self>> {
        match bounds {
            [start, end] => Self::new(*start, *end).map(Some),
            _ => Ok(None),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(AquaError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub fn contains(&self, key: i64) -> bool {
        self.start <= key && key <= self.end
    }

    /// Bounds of an optional range, unbounded on both ends when absent
    pub fn bounds_of(range: Option<&QueryRange>) -> (i64, i64) {
        range.map_or((i64::MIN, i64::MAX), |r| (r.start, r.end))
    }
}

/// Offset pagination. Deserialized pages go through `Page::new`, so the
/// limit clamp always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PageParams")]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Wire form of a page request; both fields optional
#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    skip: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

impl From<PageParams> for Page {
    fn from(params: PageParams) -> Self {
        Page::new(params.skip, params.limit)
    }
}

impl Page {
    pub fn new(skip: Option<usize>, limit: Option<usize>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    /// Number of leading rows a source must supply for this page to be exact
    pub fn window(&self) -> usize {
        self.skip.saturating_add(self.limit)
    }
}

/// A record tagged with the partition it was read from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedRecord {
    pub partition: String,
    #[serde(flatten)]
    pub record: Record,
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage<T = Record> {
    pub records: Vec<T>,
    pub total: u64,
}

impl<T> RecordPage<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total: 0,
        }
    }
}

impl<T> Default for RecordPage<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_validation() {
        assert!(QueryRange::new(1, 1).is_ok());
        assert_eq!(
            QueryRange::new(10, 5),
            Err(AquaError::InvalidRange { start: 10, end: 5 })
        );
    }

    #[test]
    fn test_range_from_bounds() {
        assert_eq!(QueryRange::from_bounds(&[]).unwrap(), None);
        assert_eq!(QueryRange::from_bounds(&[1, 2, 3]).unwrap(), None);
        assert_eq!(
            QueryRange::from_bounds(&[1, 2]).unwrap(),
            Some(QueryRange { start: 1, end: 2 })
        );
        assert!(QueryRange::from_bounds(&[3, 2]).is_err());
    }

    #[test]
    fn test_page_defaults() {
        let page = Page::new(None, None);
        assert_eq!(page.skip, 0);
        assert_eq!(page.limit, DEFAULT_LIMIT);
        assert_eq!(Page::new(Some(5), Some(50_000)).limit, MAX_LIMIT);
        assert_eq!(Page::new(Some(5), Some(10)).window(), 15);
    }

    #[test]
    fn test_deserialized_page_is_clamped() {
        let page: Page = serde_json::from_str(r#"{"skip": 2, "limit": 50000}"#).unwrap();
        assert_eq!(page, Page { skip: 2, limit: MAX_LIMIT });

        let page: Page = serde_json::from_str("{}").unwrap();
        assert_eq!(page, Page::default());
    }
}
