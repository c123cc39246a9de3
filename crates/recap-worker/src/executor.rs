//! Job executor: consumes the queue and drives the pipeline stages.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use recap_content::ContentItemManager;
use recap_firestore::{JobRepository, UpdateStatus};
use recap_models::{clip_key, Clip, JobProgress, JobStatus, PipelineStep};
use recap_pipeline::{DailyPipeline, TranscriptionOrchestrator};
use recap_queue::{GenerateContentJob, JobQueue, QueueJob, TranscribeBatchJob};
use recap_storage::ArtifactStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Everything a job needs to run.
#[derive(Clone)]
pub struct ProcessingContext {
    pub store: Arc<ArtifactStore>,
    pub jobs: JobRepository,
    pub items: ContentItemManager,
    pub pipeline: Arc<DailyPipeline>,
    pub transcriber: TranscriptionOrchestrator,
}

/// Job executor that processes jobs from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    ctx: ProcessingContext,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: Arc<JobQueue>, ctx: ProcessingContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue,
            ctx,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Signal a graceful shutdown.
    pub fn shutdown_handle(&self) -> tokio::sync::watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Run the executor until shutdown.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically reclaim messages from crashed workers
        let claim_queue = Arc::clone(&self.queue);
        let claim_ctx = self.ctx.clone();
        let claim_semaphore = Arc::clone(&self.job_semaphore);
        let claim_consumer = self.consumer_name.clone();
        let claim_interval = self.config.claim_interval_secs;
        let claim_min_idle = self.config.claim_min_idle_ms;
        let mut shutdown_rx_claim = self.shutdown.subscribe();

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(claim_interval));
            loop {
                tokio::select! {
                    _ = shutdown_rx_claim.changed() => {
                        if *shutdown_rx_claim.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match claim_queue.claim_pending(&claim_consumer, claim_min_idle, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let ctx = claim_ctx.clone();
                                    let queue = Arc::clone(&claim_queue);
                                    let worker_id = claim_consumer.clone();
                                    let Ok(permit) =
                                        claim_semaphore.clone().acquire_owned().await
                                    else {
                                        break;
                                    };
                                    tokio::spawn(Box::pin(Self::execute_job_with_permit(
                                        ctx,
                                        queue,
                                        message_id,
                                        job,
                                        worker_id,
                                        permit,
                                    )));
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending jobs: {}", e);
                            }
                        }
                    }
                }
            }
        });

        // Main consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(Duration::from_secs(60), self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume and dispatch a batch of jobs.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(&self.consumer_name, self.config.poll_block_ms, available.min(5))
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let ctx = self.ctx.clone();
            let queue = Arc::clone(&self.queue);
            let worker_id = self.consumer_name.clone();
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(Box::pin(Self::execute_job_with_permit(
                ctx,
                queue,
                message_id,
                job,
                worker_id,
                permit,
            )));
        }

        Ok(())
    }

    /// Block until all permits are back.
    async fn wait_for_jobs(&self) {
        let _ = self
            .job_semaphore
            .acquire_many(self.config.max_concurrent_jobs as u32)
            .await;
    }

    /// Execute one job, holding the concurrency permit until it finishes.
    async fn execute_job_with_permit(
        ctx: ProcessingContext,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
        worker_id: String,
        permit: OwnedSemaphorePermit,
    ) {
        let _permit = permit;
        Self::execute_job(ctx, queue, message_id, job, worker_id).await;
    }

    /// Execute one job with retry and DLQ handling.
    async fn execute_job(
        ctx: ProcessingContext,
        queue: Arc<JobQueue>,
        message_id: String,
        job: QueueJob,
        worker_id: String,
    ) {
        let job_id = job.job_id().clone();
        let kind = job.kind();
        info!(job_id = %job_id, kind, "Picked up job from queue");

        // The state store is authoritative: a duplicate delivery of a
        // finished job is acked and dropped
        match ctx.jobs.get(&job_id).await {
            Ok(Some(record)) if record.status.is_terminal() => {
                info!(job_id = %job_id, kind, status = %record.status, "Dropping duplicate delivery of terminal job");
                queue.ack(&message_id).await.ok();
                queue.clear_dedup(&job).await.ok();
                return;
            }
            Ok(Some(record)) if record.is_expired(Utc::now()) => {
                // The cleanup sweep owns expired records; a queued one
                // cannot legally move to failed
                warn!(job_id = %job_id, kind, expires_at = %record.expires_at, "Job expired before processing");
                if record.status == JobStatus::Processing {
                    Self::fail_job(&ctx, &job, "collaborator-timeout", "job expired").await;
                }
                queue.ack(&message_id).await.ok();
                queue.clear_dedup(&job).await.ok();
                return;
            }
            Ok(Some(record)) => {
                if record.status == JobStatus::Queued {
                    let update = UpdateStatus {
                        status: Some(JobStatus::Processing),
                        worker_id: Some(worker_id.clone()),
                        ..Default::default()
                    };
                    if let Err(e) = ctx.jobs.update_status(&job_id, update).await {
                        error!(job_id = %job_id, kind, "Could not claim job: {}", e);
                        return;
                    }
                }
                // Processing already: reclaimed from a crashed worker
            }
            Ok(None) => {
                warn!(job_id = %job_id, kind, "No job record, dropping message");
                queue.ack(&message_id).await.ok();
                return;
            }
            Err(e) => {
                error!(job_id = %job_id, kind, "Job store unavailable: {}", e);
                return; // leave pending for reclaim
            }
        }

        let result = match &job {
            QueueJob::GenerateContent(generate) => Self::run_generate(&ctx, generate).await,
            QueueJob::TranscribeBatch(batch) => Self::run_transcribe_batch(&ctx, batch).await,
        };

        match result {
            Ok(StageOutcome::Completed) => {
                info!(job_id = %job_id, kind, "Job completed, all stages finished");
                queue.ack(&message_id).await.ok();
                queue.clear_dedup(&job).await.ok();
            }
            Ok(StageOutcome::Cancelled) => {
                warn!(job_id = %job_id, kind, "Job cancelled cooperatively between stages");
                queue.ack(&message_id).await.ok();
                queue.clear_dedup(&job).await.ok();
            }
            Err(e) => {
                error!(job_id = %job_id, kind, code = e.code(), "Job failed: {}", e);
                let retries = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                if e.is_retryable() && retries < queue.max_retries() {
                    // Leave the message pending; the claim sweep re-delivers
                    warn!(job_id = %job_id, kind, attempt = retries, "Leaving job pending for retry");
                } else {
                    Self::fail_job(&ctx, &job, e.code(), &e.to_string()).await;
                    queue.dlq(&message_id, &job, &e.to_string()).await.ok();
                    queue.clear_dedup(&job).await.ok();
                }
            }
        }
    }

    /// Mark the state-store record failed, exposing only a code and a
    /// redacted message.
    async fn fail_job<'a>(ctx: &'a ProcessingContext, job: &'a QueueJob, code: &'a str, message: &'a str) {
        let update = UpdateStatus {
            status: Some(JobStatus::Failed),
            error_message: Some(recap_redact::redact_text(message)),
            error_code: Some(code.to_string()),
            ..Default::default()
        };
        if let Err(e) = ctx.jobs.update_status(job.job_id(), update).await {
            error!(job_id = %job.job_id(), "Failed to record job failure: {}", e);
        }
    }

    /// Cooperative cancellation: a job that is no longer `processing` in
    /// the state store stops at the next stage boundary.
    async fn stage_boundary<'a>(
        ctx: &'a ProcessingContext,
        job: &'a GenerateContentJob,
        step: PipelineStep,
    ) -> WorkerResult<bool> {
        let record = ctx
            .jobs
            .get(&job.job_id)
            .await?
            .ok_or_else(|| WorkerError::job_failed("job record disappeared"))?;
        if record.status != JobStatus::Processing {
            warn!(
                job_id = %job.job_id,
                step = step.as_str(),
                status = %record.status,
                "Job left processing, stopping before stage"
            );
            return Ok(false);
        }

        let progress = JobProgress::at(step);
        info!(
            job_id = %job.job_id,
            date = %job.date,
            step = step.as_str(),
            stage = progress.current,
            total = progress.total,
            "Entering pipeline stage"
        );
        ctx.jobs
            .update_status(
                &job.job_id,
                UpdateStatus {
                    progress: Some(progress),
                    ..Default::default()
                },
            )
            .await?;
        Ok(true)
    }

    /// Drive a generation job through the five stages.
    async fn run_generate<'a>(
        ctx: &'a ProcessingContext,
        job: &'a GenerateContentJob,
    ) -> WorkerResult<StageOutcome> {
        let tz = ctx.pipeline.parse_timezone(&job.tz)?;
        let date = NaiveDate::parse_from_str(&job.date, "%Y-%m-%d")
            .map_err(|_| WorkerError::config_error(format!("bad job date: {}", job.date)))?;

        if !Self::stage_boundary(ctx, job, PipelineStep::FetchingContentItems).await? {
            return Ok(StageOutcome::Cancelled);
        }
        let items = ctx.pipeline.fetch_content_items(date, tz).await?;

        if !Self::stage_boundary(ctx, job, PipelineStep::BuildingManifest).await? {
            return Ok(StageOutcome::Cancelled);
        }
        let mut manifest = ctx
            .pipeline
            .build_manifest(date, tz, job.post_kind, items)
            .await?;

        if !Self::stage_boundary(ctx, job, PipelineStep::AiContentJudgment).await? {
            return Ok(StageOutcome::Cancelled);
        }
        ctx.pipeline.judge_and_draft(&mut manifest).await?;

        if !Self::stage_boundary(ctx, job, PipelineStep::PreparingResponse).await? {
            return Ok(StageOutcome::Cancelled);
        }
        let outcome = ctx.pipeline.prepare_response(&manifest).await?;

        if !Self::stage_boundary(ctx, job, PipelineStep::Completing).await? {
            return Ok(StageOutcome::Cancelled);
        }
        ctx.jobs
            .update_status(
                &job.job_id,
                UpdateStatus {
                    status: Some(JobStatus::Completed),
                    results: Some(outcome.to_results_json()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(StageOutcome::Completed)
    }

    /// Run a transcription batch, resolving each clip's content item.
    async fn run_transcribe_batch<'a>(
        ctx: &'a ProcessingContext,
        job: &'a TranscribeBatchJob,
    ) -> WorkerResult<StageOutcome> {
        let mut items = Vec::with_capacity(job.clip_ids.len());
        let mut missing: Vec<String> = Vec::new();

        for clip_id in &job.clip_ids {
            let key = clip_key(clip_id).map_err(recap_pipeline::PipelineError::from)?;
            let clip: Clip = match ctx.store.get_json(&key).await {
                Ok(clip) => clip,
                Err(e) if e.is_not_found() => {
                    missing.push(clip_id.clone());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match ctx.items.get(clip_id, clip.created_at).await? {
                Some(item) => items.push(item),
                None => missing.push(clip_id.clone()),
            }
        }

        let report = ctx.transcriber.transcribe_items(items, &ctx.items).await?;

        ctx.jobs
            .update_status(
                &job.job_id,
                UpdateStatus {
                    status: Some(JobStatus::Completed),
                    results: Some(serde_json::json!({
                        "succeeded": report.succeeded,
                        "failed": report.failed,
                        "missing": missing,
                    })),
                    ..Default::default()
                },
            )
            .await?;

        Ok(StageOutcome::Completed)
    }
}

/// How a dispatched job ended.
enum StageOutcome {
    Completed,
    Cancelled,
}
