//! Repository event storage and temporal clip correlation.
//!
//! Events arrive as webhook deliveries, are stamped with a per-type event
//! time, and are persisted into day buckets. Correlation walks the buckets
//! overlapping a clip's window and links qualifying events with a tiered
//! confidence.

pub mod correlator;
pub mod error;
pub mod event_time;

pub use correlator::{EventCorrelator, DEFAULT_WINDOW_HOURS};
pub use error::{GithubError, GithubResult};
pub use event_time::extract_event_time;
