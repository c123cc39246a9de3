//! Content-item lifecycle management and clip selection.
//!
//! The manager owns the `content-items/` keyspace: validated writes with
//! status metadata, metadata-filtered listings, read-modify-write updates
//! that preserve immutable fields, and status counts without body fetches.
//!
//! The selector scores a day's candidates on a normalized five-component
//! vector and admits them greedily under diversity caps.

pub mod entities;
pub mod error;
pub mod items;
pub mod selector;

pub use entities::extract_entities;
pub use error::{ContentError, ContentResult};
pub use items::{ContentItemManager, ItemPage, ItemQuery};
pub use selector::{
    ScoredCandidate, SelectionWeights, SelectorConfig, select_candidates, CLIP_BUDGET_MAX,
    CLIP_BUDGET_MIN, PER_HOUR_CAP,
};
