//! Worker binary: queue executor plus the daily scheduler.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recap_ai::{DraftParams, DraftingClient, TranscriptionClient};
use recap_content::ContentItemManager;
use recap_firestore::{FirestoreClient, JobRepository};
use recap_github::EventCorrelator;
use recap_pipeline::{DailyPipeline, Drafter, PipelineConfig, TranscriptionOrchestrator};
use recap_queue::JobQueue;
use recap_storage::ArtifactStore;
use recap_worker::executor::ProcessingContext;
use recap_worker::{JobExecutor, Scheduler, SchedulerConfig, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("recap=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }

    info!("Starting recap-worker");

    if let Err(e) = run().await {
        error!("Worker exited with error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
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
        correlator,
        drafter,
        PipelineConfig::from_env(),
    ));

    let ctx = ProcessingContext {
        store: Arc::clone(&storage),
        jobs: jobs.clone(),
        items,
        pipeline,
        transcriber,
    };

    // Daily trigger runs alongside the executor
    let scheduler = Scheduler::new(
        SchedulerConfig::from_env()?,
        jobs,
        Arc::clone(&queue),
        Arc::clone(&storage),
        transcription_client,
    );
    tokio::spawn(async move {
        if let Err(e) = scheduler.run().await {
            error!("Scheduler stopped: {}", e);
        }
    });

    let executor = JobExecutor::new(WorkerConfig::from_env(), queue, ctx);
    let shutdown = executor.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown.send(true);
        }
    });

    executor.run().await?;
    Ok(())
}
