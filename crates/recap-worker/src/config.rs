//! Worker configuration.

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Max jobs processed concurrently
    pub max_concurrent_jobs: usize,
    /// How long a consume call blocks waiting for messages, ms
    pub poll_block_ms: u64,
    /// How often the pending-claim sweep runs, seconds
    pub claim_interval_secs: u64,
    /// Idle threshold before a pending message is reclaimed, ms
    pub claim_min_idle_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            poll_block_ms: 1000,
            claim_interval_secs: 60,
            // Content generation can legitimately take minutes; reclaiming
            // too early duplicates in-progress jobs
            claim_min_idle_ms: 600_000,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            poll_block_ms: std::env::var("WORKER_POLL_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.poll_block_ms),
            claim_interval_secs: std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.claim_interval_secs),
            claim_min_idle_ms: std::env::var("WORKER_CLAIM_MIN_IDLE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.claim_min_idle_ms),
        }
    }
}
