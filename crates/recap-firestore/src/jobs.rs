//! Typed repository for job records.
//!
//! `update_status` is the sole mutation entry for job state; it enforces the
//! `queued -> processing -> {completed|failed}` machine and stamps the
//! bookkeeping fields. Listings are cursor-paged over `__name__`, which works
//! because job ids are time-ordered.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use recap_models::{Job, JobId, JobProgress, JobStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::types::{
    fields_to_json_object, json_object_to_fields, Cursor, CollectionSelector, Document, Filter,
    FieldReference, Order, StructuredQuery, Value,
};

/// Collection holding job documents.
const JOBS_COLLECTION: &str = "jobs";

/// Page-size bounds for job listings.
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Batch size for the expiry sweep.
const CLEANUP_BATCH: i32 = 500;

/// Sort direction for job listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Parse from string, returning default if invalid.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Self::Ascending,
            _ => Self::Descending,
        }
    }

    const fn firestore_direction(&self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

/// Listing parameters.
#[derive(Debug, Clone, Default)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
    pub order: SortOrder,
}

/// One page of jobs.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Aggregate job counts over a recent window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStats {
    pub window_hours: i64,
    pub total: u64,
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// The single mutation payload accepted by [`JobRepository::update_status`].
#[derive(Debug, Clone, Default)]
pub struct UpdateStatus {
    pub status: Option<JobStatus>,
    pub worker_id: Option<String>,
    pub progress: Option<JobProgress>,
    pub results: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
}

/// Job-state store repository.
#[derive(Clone)]
pub struct JobRepository {
    client: FirestoreClient,
    retry: RetryConfig,
}

impl JobRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            client,
            retry: RetryConfig::from_env(),
        }
    }

    /// Create a queued job record. Job ids are unique; a duplicate create is
    /// a conflict, not an upsert.
    pub async fn create(&self, job: &Job) -> FirestoreResult<()> {
        let fields = job_to_fields(job)?;
        let job_id = job.job_id.as_str().to_string();

        with_retry(&self.retry, "create_job", || {
            let fields = fields.clone();
            let job_id = job_id.clone();
            async move {
                self.client
                    .create_document(JOBS_COLLECTION, &job_id, fields)
                    .await
            }
        })
        .await?;

        record_request("create_job", "ok");
        info!(job_id = %job.job_id, "Created job record");
        Ok(())
    }

    /// Fetch a job by id.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<Job>> {
        let doc = with_retry(&self.retry, "get_job", || async {
            self.client.get_document(JOBS_COLLECTION, job_id.as_str()).await
        })
        .await?;

        record_request("get_job", "ok");
        doc.map(|d| job_from_document(&d)).transpose()
    }

    /// Apply a status/progress mutation.
    ///
    /// Read-modify-write: the stored record is loaded, the transition is
    /// validated against the state machine, bookkeeping fields are stamped,
    /// and the full record is written back.
    pub async fn update_status(&self, job_id: &JobId, update: UpdateStatus) -> FirestoreResult<Job> {
        let mut job = self
            .get(job_id)
            .await?
            .ok_or_else(|| FirestoreError::not_found(job_id.as_str()))?;

        if let Some(next) = update.status {
            job.transition(next, update.worker_id.as_deref())
                .map_err(|e| FirestoreError::InvalidTransition(e.to_string()))?;
        } else {
            job.updated_at = Utc::now();
        }
        if let Some(progress) = update.progress {
            job.progress = progress;
        }
        if let Some(results) = update.results {
            job.results = Some(results);
        }
        if let Some(message) = update.error_message {
            job.error_message = Some(message);
        }
        if let Some(code) = update.error_code {
            job.error_code = Some(code);
        }

        let fields = job_to_fields(&job)?;
        with_retry(&self.retry, "update_job", || {
            let fields = fields.clone();
            async move {
                self.client
                    .update_document(JOBS_COLLECTION, job_id.as_str(), fields, None)
                    .await
            }
        })
        .await?;

        record_request("update_job", "ok");
        debug!(job_id = %job_id, status = %job.status, "Updated job record");
        Ok(job)
    }

    /// Cursor-paged listing, ascending or descending by job id.
    pub async fn list(&self, query: ListJobsQuery) -> FirestoreResult<JobPage> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE) as i32;

        let mut structured = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: JOBS_COLLECTION.to_string(),
                all_descendants: None,
            }],
            filter: query
                .status
                .map(|s| Filter::field("status", "EQUAL", Value::StringValue(s.as_str().into()))),
            order_by: Some(vec![Order {
                field: FieldReference {
                    field_path: "__name__".to_string(),
                },
                direction: query.order.firestore_direction().to_string(),
            }]),
            start_at: None,
            // Fetch one extra row to learn whether another page exists
            limit: Some(limit + 1),
        };

        if let Some(cursor) = &query.cursor {
            let job_id = decode_cursor(cursor)
                .ok_or_else(|| FirestoreError::request_failed("malformed cursor"))?;
            structured.start_at = Some(Cursor {
                values: vec![Value::ReferenceValue(
                    self.client.document_name(JOBS_COLLECTION, &job_id),
                )],
                before: Some(false),
            });
        }

        let docs = with_retry(&self.retry, "list_jobs", || {
            let structured = structured.clone();
            async move { self.client.run_query(structured).await }
        })
        .await?;

        record_request("list_jobs", "ok");

        let mut jobs: Vec<Job> = docs
            .iter()
            .map(job_from_document)
            .collect::<FirestoreResult<_>>()?;

        let has_more = jobs.len() > limit as usize;
        jobs.truncate(limit as usize);
        let next_cursor = if has_more {
            jobs.last().map(|j| encode_cursor(&j.job_id))
        } else {
            None
        };

        Ok(JobPage {
            jobs,
            next_cursor,
            has_more,
        })
    }

    /// Delete records whose `expires_at` has passed. Returns the number of
    /// deleted records.
    pub async fn cleanup_expired(&self) -> FirestoreResult<u64> {
        let now = Utc::now();
        let structured = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: JOBS_COLLECTION.to_string(),
                all_descendants: None,
            }],
            filter: Some(Filter::field(
                "expires_at",
                "LESS_THAN",
                Value::TimestampValue(now.to_rfc3339()),
            )),
            order_by: Some(vec![Order {
                field: FieldReference {
                    field_path: "expires_at".to_string(),
                },
                direction: "ASCENDING".to_string(),
            }]),
            start_at: None,
            limit: Some(CLEANUP_BATCH),
        };

        let docs = with_retry(&self.retry, "cleanup_jobs", || {
            let structured = structured.clone();
            async move { self.client.run_query(structured).await }
        })
        .await?;

        let mut deleted = 0u64;
        for doc in docs {
            if let Some(doc_id) = doc.doc_id() {
                self.client.delete_document(JOBS_COLLECTION, doc_id).await?;
                deleted += 1;
            }
        }

        record_request("cleanup_jobs", "ok");
        if deleted > 0 {
            info!(deleted, "Cleaned up expired job records");
        }
        Ok(deleted)
    }

    /// Aggregate counts over the recent window.
    pub async fn stats(&self, window_hours: i64) -> FirestoreResult<JobStats> {
        let since = Utc::now() - Duration::hours(window_hours);
        let structured = StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: JOBS_COLLECTION.to_string(),
                all_descendants: None,
            }],
            filter: Some(Filter::field(
                "created_at",
                "GREATER_THAN_OR_EQUAL",
                Value::TimestampValue(since.to_rfc3339()),
            )),
            order_by: Some(vec![Order {
                field: FieldReference {
                    field_path: "created_at".to_string(),
                },
                direction: "DESCENDING".to_string(),
            }]),
            start_at: None,
            limit: Some(1000),
        };

        let docs = with_retry(&self.retry, "job_stats", || {
            let structured = structured.clone();
            async move { self.client.run_query(structured).await }
        })
        .await?;

        let mut stats = JobStats {
            window_hours,
            total: 0,
            queued: 0,
            processing: 0,
            completed: 0,
            failed: 0,
        };
        for doc in &docs {
            let job = job_from_document(doc)?;
            stats.total += 1;
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }

        record_request("job_stats", "ok");
        Ok(stats)
    }
}

/// Timestamp fields stored as `timestampValue` so range filters order
/// chronologically.
const TIMESTAMP_FIELDS: [&str; 5] = [
    "created_at",
    "updated_at",
    "expires_at",
    "started_at",
    "completed_at",
];

fn job_to_fields(job: &Job) -> FirestoreResult<HashMap<String, Value>> {
    let json = serde_json::to_value(job)?;
    let mut fields = json_object_to_fields(&json);
    for name in TIMESTAMP_FIELDS {
        if let Some(Value::StringValue(s)) = fields.get(name) {
            let ts = Value::TimestampValue(s.clone());
            fields.insert(name.to_string(), ts);
        }
    }
    Ok(fields)
}

fn job_from_document(doc: &Document) -> FirestoreResult<Job> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| FirestoreError::invalid_record("document has no fields"))?;
    let json = fields_to_json_object(fields);
    serde_json::from_value(json).map_err(|e| FirestoreError::invalid_record(e.to_string()))
}

/// Cursors are the URL-encoded job id of the last row on the page.
fn encode_cursor(job_id: &JobId) -> String {
    urlencoding::encode(job_id.as_str()).into_owned()
}

fn decode_cursor(encoded: &str) -> Option<String> {
    let decoded = urlencoding::decode(encoded).ok()?.into_owned();
    if decoded.is_empty()
        || decoded.len() > 64
        || !decoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return None;
    }
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_roundtrip() {
        let job = Job::new(serde_json::json!({}));
        let encoded = encode_cursor(&job.job_id);
        assert_eq!(decode_cursor(&encoded).as_deref(), Some(job.job_id.as_str()));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(decode_cursor("projects%2Fvictim%2Fdoc").is_none());
        assert!(decode_cursor("").is_none());
    }

    #[test]
    fn test_job_document_roundtrip() {
        let mut job = Job::new(serde_json::json!({"kind": "generate_content", "date": "2024-05-10"}));
        job.transition(JobStatus::Processing, Some("worker-1")).unwrap();
        job.progress = JobProgress::at(recap_models::PipelineStep::BuildingManifest);

        let fields = job_to_fields(&job).unwrap();
        assert!(matches!(
            fields.get("created_at"),
            Some(Value::TimestampValue(_))
        ));

        let doc = Document::new(fields);
        let back = job_from_document(&doc).unwrap();
        assert_eq!(back.job_id, job.job_id);
        assert_eq!(back.status, JobStatus::Processing);
        assert_eq!(back.progress.step, "building_manifest");
        assert_eq!(back.worker_id.as_deref(), Some("worker-1"));
    }
}
