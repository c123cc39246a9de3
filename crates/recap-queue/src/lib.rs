//! Redis Streams job queue.
//!
//! At-least-once hand-off of job identifiers to background workers:
//! - Idempotent enqueue (SETNX dedup keyed by the job's idempotency key)
//! - Consumer-group consume/ack
//! - Pending-claim recovery for crashed workers
//! - Dead-letter stream for poisoned jobs
//! - API-level idempotency locks for state-changing requests
//!
//! Duplicate delivery is expected; consumers treat the job-state store as
//! the authoritative status.

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{GenerateContentJob, QueueJob, TranscribeBatchJob};
pub use queue::{JobQueue, QueueConfig};
