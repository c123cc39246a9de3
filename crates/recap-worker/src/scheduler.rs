//! Daily scheduler: wakes at the configured UTC time and enqueues the
//! day's recap job, with an optional hourly credential probe.

use std::sync::Arc;

use chrono::{Days, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use recap_ai::TranscriptionClient;
use recap_firestore::JobRepository;
use recap_models::{Job, PostKind};
use recap_queue::{GenerateContentJob, JobQueue};
use recap_storage::ArtifactStore;

use crate::error::{WorkerError, WorkerResult};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Daily trigger, UTC (`HH:MM`)
    pub daily_run_utc: NaiveTime,
    /// Blog timezone the recap date is computed in
    pub timezone: String,
    /// How many days back the recap reaches (1 = yesterday)
    pub date_offset_days: u64,
    /// Run the hourly collaborator credential probe
    pub credential_probe: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_run_utc: NaiveTime::from_hms_opt(9, 15, 0).expect("valid trigger time"),
            timezone: "America/New_York".to_string(),
            date_offset_days: 1,
            credential_probe: true,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();
        let daily_run_utc = match std::env::var("DAILY_RUN_UTC") {
            Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
                .map_err(|_| WorkerError::config_error(format!("bad DAILY_RUN_UTC: {raw}")))?,
            Err(_) => defaults.daily_run_utc,
        };
        Ok(Self {
            daily_run_utc,
            timezone: std::env::var("BLOG_TIMEZONE").unwrap_or(defaults.timezone),
            date_offset_days: std::env::var("RECAP_DATE_OFFSET_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.date_offset_days),
            credential_probe: std::env::var("CREDENTIAL_PROBE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.credential_probe),
        })
    }
}

/// Cron-equivalent entrypoint that spawns the daily job.
pub struct Scheduler {
    config: SchedulerConfig,
    jobs: JobRepository,
    queue: Arc<JobQueue>,
    storage: Arc<ArtifactStore>,
    transcription: TranscriptionClient,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        jobs: JobRepository,
        queue: Arc<JobQueue>,
        storage: Arc<ArtifactStore>,
        transcription: TranscriptionClient,
    ) -> Self {
        Self {
            config,
            jobs,
            queue,
            storage,
            transcription,
        }
    }

    /// Run the daily trigger loop. Never returns under normal operation.
    pub async fn run(&self) -> WorkerResult<()> {
        let tz: Tz = self
            .config
            .timezone
            .parse()
            .map_err(|_| WorkerError::config_error(format!("bad timezone: {}", self.config.timezone)))?;

        info!(
            trigger = %self.config.daily_run_utc,
            tz = %tz,
            "Scheduler started"
        );

        if self.config.credential_probe {
            self.spawn_probe();
        }

        loop {
            let wait = seconds_until(self.config.daily_run_utc);
            info!(seconds = wait, "Sleeping until next daily trigger");
            sleep(Duration::from_secs(wait)).await;

            if let Err(e) = self.fire(tz).await {
                warn!("Daily trigger failed: {}", e);
            }

            // Step past the trigger instant before recomputing
            sleep(Duration::from_secs(60)).await;
        }
    }

    /// Create and enqueue the day's job.
    async fn fire(&self, tz: Tz) -> WorkerResult<()> {
        let date = Utc::now()
            .with_timezone(&tz)
            .date_naive()
            .checked_sub_days(Days::new(self.config.date_offset_days))
            .ok_or_else(|| WorkerError::config_error("date offset underflow"))?;
        let date_str = date.format("%Y-%m-%d").to_string();

        let job = Job::new(serde_json::json!({
            "kind": "generate_content",
            "date": date_str,
            "tz": tz.name(),
            "post_kind": PostKind::DailyRecap,
            "trigger": "scheduler",
        }));
        self.jobs.create(&job).await?;

        let queue_job = GenerateContentJob {
            job_id: job.job_id.clone(),
            date: date_str.clone(),
            tz: tz.name().to_string(),
            post_kind: PostKind::DailyRecap,
            created_at: Utc::now(),
        };

        match self.queue.enqueue_generate(queue_job).await {
            Ok(message_id) => {
                info!(date = %date_str, job_id = %job.job_id, message_id, "Enqueued daily recap job");
            }
            Err(e) if e.is_duplicate() => {
                // A manual run already covered this date
                info!(date = %date_str, "Daily recap already enqueued, skipping");
            }
            Err(e) => return Err(e.into()),
        }

        // Opportunistic sweep of expired records alongside the daily run
        match self.jobs.cleanup_expired().await {
            Ok(0) => {}
            Ok(n) => info!(deleted = n, "Swept expired job records"),
            Err(e) => warn!("Expired-job sweep failed: {}", e),
        }

        Ok(())
    }

    /// Hourly collaborator credential probe.
    fn spawn_probe(&self) {
        let storage = Arc::clone(&self.storage);
        let transcription = self.transcription.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                if let Err(e) = storage.check_connectivity().await {
                    warn!("Storage credential probe failed: {}", e);
                }
                if let Err(e) = transcription.check_connectivity().await {
                    warn!("Transcription credential probe failed: {}", e);
                }
            }
        });
    }
}

/// Seconds until the next occurrence of a UTC time of day.
fn seconds_until(target: NaiveTime) -> u64 {
    let now = Utc::now();
    let today_target = now.date_naive().and_time(target).and_utc();
    let next = if today_target > now {
        today_target
    } else {
        (now.date_naive() + Days::new(1)).and_time(target).and_utc()
    };
    (next - now).num_seconds().max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_until_is_bounded() {
        let target = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
        let wait = seconds_until(target);
        assert!(wait >= 1);
        assert!(wait <= 24 * 3600);
    }

    #[test]
    fn test_config_default_trigger() {
        let config = SchedulerConfig::default();
        assert_eq!(config.daily_run_utc.format("%H:%M").to_string(), "09:15");
        assert_eq!(config.date_offset_days, 1);
    }
}
