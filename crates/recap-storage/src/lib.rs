//! Cloudflare R2 artifact store adapter.
//!
//! This crate provides:
//! - Keyed blob put/get/head/delete with custom metadata
//! - Cursor-paged listings, with and without per-object metadata
//! - Key safety guards (traversal-shaped keys never reach the store)
//! - Connectivity checks for the validation probes

pub mod client;
pub mod error;

pub use client::{
    ArtifactStore, ArtifactStoreConfig, HeadInfo, ObjectInfo, ObjectPage, DEFAULT_HEAD_PARALLELISM,
};
pub use error::{StorageError, StorageResult};
