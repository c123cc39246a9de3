//! Application state.

use std::sync::Arc;
use std::time::Instant;

use recap_ai::{DraftParams, DraftingClient, TranscriptionClient};
use recap_content::ContentItemManager;
use recap_firestore::{FirestoreClient, JobRepository};
use recap_github::EventCorrelator;
use recap_pipeline::{DailyPipeline, Drafter, PipelineConfig, TranscriptionOrchestrator};
use recap_queue::JobQueue;
use recap_redact::ErrorTracker;
use recap_storage::ArtifactStore;

use crate::config::ApiConfig;
use crate::services::TwitchClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<ArtifactStore>,
    pub jobs: JobRepository,
    pub queue: Arc<JobQueue>,
    pub items: ContentItemManager,
    pub correlator: EventCorrelator,
    pub transcriber: TranscriptionOrchestrator,
    pub pipeline: Arc<DailyPipeline>,
    pub twitch: TwitchClient,
    pub transcription_client: TranscriptionClient,
    pub errors: Arc<ErrorTracker>,
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = Arc::new(ArtifactStore::from_env().await?);
        let firestore = FirestoreClient::from_env().await?;
        let jobs = JobRepository::new(firestore);
        let queue = Arc::new(JobQueue::from_env()?);

        let items = ContentItemManager::new(Arc::clone(&storage));
        let correlator = EventCorrelator::new(Arc::clone(&storage));

        let transcription_client = TranscriptionClient::from_env()?;
        let transcriber =
            TranscriptionOrchestrator::new(Arc::clone(&storage), transcription_client.clone());

        let drafter = Drafter::new(DraftingClient::from_env()?, DraftParams::from_env());
        let pipeline = Arc::new(DailyPipeline::new(
            Arc::clone(&storage),
            items.clone(),
            correlator.clone(),
            drafter,
            PipelineConfig::from_env(),
        ));

        let twitch = TwitchClient::from_env()?;

        Ok(Self {
            config,
            storage,
            jobs,
            queue,
            items,
            correlator,
            transcriber,
            pipeline,
            twitch,
            transcription_client,
            errors: Arc::new(ErrorTracker::new()),
            started_at: Instant::now(),
        })
    }
}
