//! Job store
//!
//! Keeps the live state of every job keyed by its id. The runner owning a job
//! is the only writer of that entry; status and download requests read snapshots.
//!
//! # Eviction
//!
//! Memory is bounded by [`EvictionPolicy`]:
//!
//! 1. finished jobs older than `ttl` are removed;
//! 2. if the store still holds more than `max_entries` jobs, the oldest finished
//!    jobs go next.
//!
//! Queued and running jobs are never evicted, so the store may temporarily exceed
//! `max_entries` when that many jobs are in flight.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Registered, waiting for a worker permit
    Queued,
    Running,
    /// Terminal; the report path (if any) is final
    Done,
}

/// Snapshot of a job
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    pub id: Uuid,
    #[serde(rename = "state")]
    pub phase: JobPhase,
    pub current: usize,
    pub total: usize,
    pub logs: Vec<String>,
    pub report_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobState {
    fn new(total: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: JobPhase::Queued,
            current: 0,
            total,
            logs: Vec::new(),
            report_path: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == JobPhase::Done
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job {0} has already finished")]
    AlreadyFinished(Uuid),
}

/// Storage for job state
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Register a new queued job over `total` rows
    async fn create(&self, total: usize) -> JobState;

    async fn get(&self, id: Uuid) -> Option<JobState>;

    /// All jobs, newest first
    async fn list(&self) -> Vec<JobState>;

    async fn mark_running(&self, id: Uuid) -> Result<(), JobStoreError>;

    /// Append a row's log line and advance the processed count
    async fn record_row(&self, id: Uuid, log: String) -> Result<(), JobStoreError>;

    /// Move a job to its terminal state. Succeeds once per job.
    async fn complete(&self, id: Uuid, report_path: Option<PathBuf>) -> Result<(), JobStoreError>;

    /// Remove jobs the eviction policy no longer keeps, returning them
    async fn evict_expired(&self, now: DateTime<Utc>) -> Vec<JobState>;

    async fn len(&self) -> usize;
}

/// Bounds on how many finished jobs are kept and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl: Duration::from_secs(86_400),
        }
    }
}

/// Process-local job store
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, JobState>>,
    policy: EvictionPolicy,
}

impl InMemoryJobStore {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            policy,
        }
    }

    async fn modify<F>(&self, id: Uuid, f: F) -> Result<(), JobStoreError>
    where
        F: FnOnce(&mut JobState) -> Result<(), JobStoreError> + Send,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.is_done() {
            return Err(JobStoreError::AlreadyFinished(id));
        }
        f(job)
    }

    fn is_expired(&self, job: &JobState, now: DateTime<Utc>) -> bool {
        job.finished_at
            .and_then(|finished| (now - finished).to_std().ok())
            .map_or(false, |age| age >= self.policy.ttl)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, total: usize) -> JobState {
        let job = JobState::new(total);
        self.jobs.write().await.insert(job.id, job.clone());
        job
    }

    async fn get(&self, id: Uuid) -> Option<JobState> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn list(&self) -> Vec<JobState> {
        let mut jobs: Vec<JobState> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    async fn mark_running(&self, id: Uuid) -> Result<(), JobStoreError> {
        self.modify(id, |job| {
            job.phase = JobPhase::Running;
            job.started_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    async fn record_row(&self, id: Uuid, log: String) -> Result<(), JobStoreError> {
        self.modify(id, |job| {
            job.logs.push(log);
            job.current = (job.current + 1).min(job.total);
            Ok(())
        })
        .await
    }

    async fn complete(&self, id: Uuid, report_path: Option<PathBuf>) -> Result<(), JobStoreError> {
        self.modify(id, |job| {
            job.phase = JobPhase::Done;
            job.report_path = report_path;
            job.finished_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> Vec<JobState> {
        let mut jobs = self.jobs.write().await;

        let expired: Vec<Uuid> = jobs
            .values()
            .filter(|job| self.is_expired(job, now))
            .map(|job| job.id)
            .collect();
        let mut evicted: Vec<JobState> = expired.iter().filter_map(|id| jobs.remove(id)).collect();

        if jobs.len() > self.policy.max_entries {
            let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
                .values()
                .filter_map(|job| job.finished_at.map(|at| (at, job.id)))
                .collect();
            finished.sort();

            let excess = jobs.len() - self.policy.max_entries;
            for (_, id) in finished.into_iter().take(excess) {
                if let Some(job) = jobs.remove(&id) {
                    evicted.push(job);
                }
            }
        }

        evicted
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}
