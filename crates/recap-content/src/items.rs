//! Content-item manager: the owner of the `content-items/` keyspace.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use recap_models::{
    content_item_key, content_item_prefix, ContentCategory, ContentItem, ContentItemUpdate,
    ProcessingStatus,
};
use recap_storage::{ArtifactStore, DEFAULT_HEAD_PARALLELISM};

use crate::error::{ContentError, ContentResult};

/// Default and maximum listing page sizes.
pub const DEFAULT_LIST_LIMIT: usize = 25;
pub const MAX_LIST_LIMIT: usize = 100;

/// Listing filters.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Inclusive date range over `clip_created_at` (UTC days)
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub processing_status: Option<ProcessingStatus>,
    pub content_category: Option<ContentCategory>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

/// One page of items.
#[derive(Debug, Clone)]
pub struct ItemPage {
    pub items: Vec<ContentItem>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Cursor state: the month being walked plus the storage continuation
/// token inside it. Earlier months are already consumed.
struct ItemCursor {
    year: i32,
    month: u32,
    token: Option<String>,
}

impl ItemCursor {
    fn encode(&self) -> String {
        let raw = match &self.token {
            Some(token) => format!("{:04}-{:02}|{}", self.year, self.month, token),
            None => format!("{:04}-{:02}|", self.year, self.month),
        };
        urlencoding::encode(&raw).into_owned()
    }

    fn decode(encoded: &str) -> Option<Self> {
        let decoded = urlencoding::decode(encoded).ok()?;
        let (month_part, token) = decoded.split_once('|')?;
        let (year, month) = month_part.split_once('-')?;
        Some(Self {
            year: year.parse().ok()?,
            month: month.parse().ok()?,
            token: if token.is_empty() {
                None
            } else {
                Some(token.to_string())
            },
        })
    }
}

/// Unified per-clip record manager.
#[derive(Clone)]
pub struct ContentItemManager {
    store: Arc<ArtifactStore>,
}

impl ContentItemManager {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    /// Metadata written on every item so listings can filter without
    /// fetching bodies.
    fn metadata_for(item: &ContentItem) -> HashMap<String, String> {
        HashMap::from([
            ("schema-version".to_string(), item.schema_version.to_string()),
            ("clip-id".to_string(), item.clip_id.clone()),
            ("created-at".to_string(), item.clip_created_at.to_rfc3339()),
            (
                "processing-status".to_string(),
                item.processing_status.as_str().to_string(),
            ),
        ])
    }

    /// Validate and persist an item, stamping `stored_at` server-side.
    pub async fn store(&self, mut item: ContentItem) -> ContentResult<ContentItem> {
        item.stored_at = Utc::now();
        item.validate()?;

        let key = item.storage_key()?;
        let body = serde_json::to_vec(&item)?;
        self.store
            .put(&key, body, "application/json", Self::metadata_for(&item))
            .await?;

        info!(clip_id = %item.clip_id, status = %item.processing_status, "Stored content item");
        Ok(item)
    }

    /// Fetch one item by clip id and creation instant.
    pub async fn get(
        &self,
        clip_id: &str,
        created_at: DateTime<Utc>,
    ) -> ContentResult<Option<ContentItem>> {
        let key = content_item_key(clip_id, created_at)?;
        match self.store.get_json::<ContentItem>(&key).await {
            Ok(item) => Ok(Some(item)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read-modify-write update.
    ///
    /// Immutable fields survive because the update type cannot express
    /// them; status regressions are rejected by the state machine.
    pub async fn update(
        &self,
        clip_id: &str,
        created_at: DateTime<Utc>,
        update: ContentItemUpdate,
    ) -> ContentResult<ContentItem> {
        let item = self
            .get(clip_id, created_at)
            .await?
            .ok_or_else(|| ContentError::not_found(clip_id))?;

        let merged = update.apply(item)?;
        let key = merged.storage_key()?;
        let body = serde_json::to_vec(&merged)?;
        self.store
            .put(&key, body, "application/json", Self::metadata_for(&merged))
            .await?;

        debug!(clip_id, status = %merged.processing_status, "Updated content item");
        Ok(merged)
    }

    /// Cursor-paged listing with date/status/category filters.
    ///
    /// Date ranges enumerate year/month prefixes; the cursor is honored
    /// within its month only - earlier months are treated as consumed.
    pub async fn list(&self, query: ItemQuery) -> ContentResult<ItemPage> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let (range_start, range_end) = match query.date_range {
            Some((start, end)) if start <= end => (start, end),
            Some(_) => return Err(ContentError::invalid_query("date range start after end")),
            None => {
                // Without a range, walk the current month only
                let today = Utc::now().date_naive();
                (today.with_day(1).unwrap_or(today), today)
            }
        };

        let cursor = match &query.cursor {
            Some(encoded) => Some(
                ItemCursor::decode(encoded)
                    .ok_or_else(|| ContentError::invalid_query("malformed cursor"))?,
            ),
            None => None,
        };

        let mut months = month_span(range_start, range_end);
        if let Some(cursor) = &cursor {
            months.retain(|&(y, m)| (y, m) >= (cursor.year, cursor.month));
        }

        let mut items: Vec<ContentItem> = Vec::new();
        let mut next_cursor: Option<String> = None;

        'months: for (year, month) in months {
            let prefix = content_item_prefix(year, month);
            let mut token = match &cursor {
                Some(c) if (c.year, c.month) == (year, month) => c.token.clone(),
                _ => None,
            };

            loop {
                let page = self
                    .store
                    .list_with_metadata(&prefix, token.as_deref(), Some(limit as i32))
                    .await?;

                // Metadata-level filters run before any body fetch
                let keys: Vec<String> = page
                    .objects
                    .iter()
                    .filter(|obj| {
                        metadata_matches(
                            &obj.custom_metadata,
                            query.processing_status,
                            range_start,
                            range_end,
                        )
                    })
                    .map(|obj| obj.key.clone())
                    .collect();

                let fetched: Vec<ContentItem> = stream::iter(keys.iter())
                    .map(|key| self.store.get_json::<ContentItem>(key))
                    .buffered(DEFAULT_HEAD_PARALLELISM)
                    .filter_map(|result| async move { result.ok() })
                    .collect()
                    .await;

                for item in fetched {
                    if let Some(category) = query.content_category {
                        if item.content_category != Some(category) {
                            continue;
                        }
                    }
                    items.push(item);
                    if items.len() >= limit {
                        // Resume inside this month, or at the next month
                        // when this one is exhausted
                        next_cursor = match page.cursor.clone() {
                            Some(token) => Some(
                                ItemCursor {
                                    year,
                                    month,
                                    token: Some(token),
                                }
                                .encode(),
                            ),
                            None => next_month(year, month, range_end).map(|(y, m)| {
                                ItemCursor {
                                    year: y,
                                    month: m,
                                    token: None,
                                }
                                .encode()
                            }),
                        };
                        break 'months;
                    }
                }

                if page.truncated {
                    token = page.cursor;
                } else {
                    break;
                }
            }
        }

        let has_more = next_cursor.is_some();
        Ok(ItemPage {
            items,
            next_cursor,
            has_more,
        })
    }

    /// Status counts over the whole keyspace, via metadata only.
    pub async fn status_counts(&self) -> ContentResult<HashMap<String, u64>> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .store
                .list_with_metadata("content-items/", cursor.as_deref(), None)
                .await?;
            for obj in &page.objects {
                let status = obj
                    .custom_metadata
                    .get("processing-status")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                *counts.entry(status).or_insert(0) += 1;
            }
            if page.truncated {
                cursor = page.cursor;
            } else {
                break;
            }
        }

        Ok(counts)
    }
}

/// The month after `(year, month)`, if it still overlaps the range.
fn next_month(year: i32, month: u32, range_end: NaiveDate) -> Option<(i32, u32)> {
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    if (y, m) <= (range_end.year(), range_end.month()) {
        Some((y, m))
    } else {
        None
    }
}

/// Year/month pairs covering an inclusive date range.
fn month_span(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (start.year(), start.month());
    while (year, month) <= (end.year(), end.month()) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}

fn metadata_matches(
    metadata: &HashMap<String, String>,
    status: Option<ProcessingStatus>,
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> bool {
    if let Some(want) = status {
        let found = metadata
            .get("processing-status")
            .and_then(|s| ProcessingStatus::parse(s));
        if found != Some(want) {
            return false;
        }
    }
    if let Some(created) = metadata
        .get("created-at")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        let date = created.with_timezone(&Utc).date_naive();
        if date < range_start || date > range_end {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_span() {
        let start = NaiveDate::from_ymd_opt(2024, 11, 20).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        assert_eq!(
            month_span(start, end),
            vec![(2024, 11), (2024, 12), (2025, 1), (2025, 2)]
        );
    }

    #[test]
    fn test_next_month_respects_range_end() {
        let end = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(next_month(2024, 11, end), Some((2024, 12)));
        assert_eq!(next_month(2024, 12, end), Some((2025, 1)));
        assert_eq!(next_month(2025, 1, end), None);
    }

    #[test]
    fn test_cursor_roundtrip() {
        let cursor = ItemCursor {
            year: 2024,
            month: 5,
            token: Some("opaque-token".to_string()),
        };
        let decoded = ItemCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.year, 2024);
        assert_eq!(decoded.month, 5);
        assert_eq!(decoded.token.as_deref(), Some("opaque-token"));

        assert!(ItemCursor::decode("garbage").is_none());
    }

    #[test]
    fn test_metadata_filters() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();

        let meta = HashMap::from([
            ("processing-status".to_string(), "transcribed".to_string()),
            ("created-at".to_string(), "2024-05-10T14:00:00+00:00".to_string()),
        ]);

        assert!(metadata_matches(&meta, None, start, end));
        assert!(metadata_matches(
            &meta,
            Some(ProcessingStatus::Transcribed),
            start,
            end
        ));
        assert!(!metadata_matches(
            &meta,
            Some(ProcessingStatus::Pending),
            start,
            end
        ));

        let june_start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let june_end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert!(!metadata_matches(&meta, None, june_start, june_end));
    }
}
