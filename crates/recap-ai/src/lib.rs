//! HTTP clients for the model collaborators.
//!
//! Both collaborators are interface-only from the pipeline's point of view:
//! a transcription model that turns base64 WAV audio into timed segments,
//! and a drafting model that turns a prompt into prose. Neither client
//! retries in-process; job-level retry is the worker's decision.

pub mod drafting;
pub mod error;
pub mod extract;
pub mod transcription;

pub use drafting::{DraftParams, DraftingClient, DraftingConfig};
pub use error::{AiError, AiResult};
pub use extract::extract_json;
pub use transcription::{
    TranscriptionClient, TranscriptionConfig, TranscriptionResponse, TranscriptionSegment,
};
