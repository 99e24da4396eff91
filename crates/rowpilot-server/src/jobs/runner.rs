//! Job runner
//!
//! Each submitted job becomes one tokio task. Tasks wait on a shared semaphore,
//! so at most `max_concurrent_jobs` jobs process rows at a time; the rest stay
//! `queued`. Within a job rows are handled strictly in order, and a failing or
//! panicking row is recorded without stopping the batch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use rowpilot_common::types::{MappedDataset, MappedRecord};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::action::RowAction;
use super::report::{write_report, ReportRow, RowStatus};
use super::store::JobStore;

/// Spawns and drives background jobs
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    action: Arc<dyn RowAction>,
    permits: Arc<Semaphore>,
    report_dir: PathBuf,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        action: Arc<dyn RowAction>,
        max_concurrent_jobs: usize,
        report_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            action,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            report_dir: report_dir.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Register a job over `dataset` and start it in the background.
    ///
    /// Returns as soon as the job is registered; the job is visible in the store
    /// before this returns.
    pub async fn submit(&self, dataset: MappedDataset) -> Uuid {
        let job = self.store.create(dataset.len()).await;
        info!(job_id = %job.id, total = job.total, "Job submitted");

        let runner = self.clone();
        tokio::spawn(runner.run(job.id, dataset));

        job.id
    }

    #[tracing::instrument(skip(self, dataset), fields(job_id = %job_id, total = dataset.len()))]
    async fn run(self, job_id: Uuid, dataset: MappedDataset) {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!(error = %e, "Worker pool closed before job could start");
                self.finish(job_id, None).await;
                return;
            },
        };

        if let Err(e) = self.store.mark_running(job_id).await {
            warn!(error = %e, "Job vanished before it started");
            return;
        }
        info!("Job started");

        let MappedDataset { fields, records } = dataset;
        let mut rows = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let row = self.process_row(index + 1, record).await;

            let log = match row.status {
                RowStatus::Success => format!("success: {}", row.record),
                RowStatus::Error => format!("error: row {}: {}", row.row_number, row.message),
            };
            if let Err(e) = self.store.record_row(job_id, log).await {
                warn!(error = %e, row = row.row_number, "Failed to record row progress");
            }

            rows.push(row);
        }

        let failed = rows.iter().filter(|r| r.status == RowStatus::Error).count();

        let report_path = match write_report(&self.report_dir, job_id, &fields, &rows).await {
            Ok(path) => Some(path),
            Err(e) => {
                error!(error = %e, "Failed to write report");
                None
            },
        };

        self.finish(job_id, report_path).await;
        info!(succeeded = rows.len() - failed, failed, "Job finished");
    }

    async fn process_row(&self, row_number: usize, record: MappedRecord) -> ReportRow {
        let outcome = AssertUnwindSafe(self.action.execute(row_number, &record))
            .catch_unwind()
            .await;

        let (status, message) = match outcome {
            Ok(Ok(())) => (RowStatus::Success, String::new()),
            Ok(Err(e)) => (RowStatus::Error, format!("{:#}", e)),
            Err(panic) => (RowStatus::Error, panic_message(panic.as_ref())),
        };

        debug!(row = row_number, status = %status, "Processed row");

        ReportRow {
            row_number,
            record,
            status,
            message,
        }
    }

    async fn finish(&self, job_id: Uuid, report_path: Option<PathBuf>) {
        if let Err(e) = self.store.complete(job_id, report_path).await {
            error!(job_id = %job_id, error = %e, "Failed to mark job as done");
        }
    }

    /// Apply the store's eviction policy and delete the evicted reports
    pub async fn sweep(&self) -> usize {
        let evicted = self.store.evict_expired(Utc::now()).await;

        for job in &evicted {
            if let Some(path) = &job.report_path {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => {},
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                    Err(e) => {
                        warn!(job_id = %job.id, path = %path.display(), error = %e, "Failed to delete report");
                    },
                }
            }
        }

        if !evicted.is_empty() {
            info!(count = evicted.len(), "Evicted finished jobs");
        }

        evicted.len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::report::{summarize_report, StatsPolicy};
    use crate::jobs::store::{EvictionPolicy, InMemoryJobStore, JobPhase, JobState};
    use crate::jobs::SimulatedAction;
    use async_trait::async_trait;
    use rowpilot_common::types::Scalar;
    use std::time::Duration;
    use tempfile::TempDir;

    fn dataset(n: i64) -> MappedDataset {
        let records = (0..n)
            .map(|i| {
                MappedRecord::new(vec![
                    ("code".to_string(), Scalar::Int(i)),
                    ("kind".to_string(), Scalar::from(if i % 2 == 0 { "even" } else { "odd" })),
                ])
            })
            .collect();
        MappedDataset::new(vec!["code".to_string(), "kind".to_string()], records)
    }

    fn runner(dir: &TempDir, action: Arc<dyn RowAction>) -> JobRunner {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new(EvictionPolicy::default()));
        JobRunner::new(store, action, 2, dir.path())
    }

    async fn wait_until_done(runner: &JobRunner, id: Uuid) -> JobState {
        for _ in 0..500 {
            if let Some(job) = runner.store().get(id).await {
                if job.is_done() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }

    /// Fails on even row numbers, panics on row 3
    struct Flaky;

    #[async_trait]
    impl RowAction for Flaky {
        async fn execute(&self, row_number: usize, _record: &MappedRecord) -> anyhow::Result<()> {
            if row_number == 3 {
                panic!("selector not found");
            }
            if row_number % 2 == 0 {
                anyhow::bail!("timeout waiting for page");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Arc::new(SimulatedAction::new(Duration::ZERO)));

        let id = runner.submit(dataset(4)).await;
        let job = wait_until_done(&runner, id).await;

        assert_eq!(job.phase, JobPhase::Done);
        assert_eq!(job.current, 4);
        assert_eq!(job.total, 4);
        assert_eq!(job.logs.len(), 4);
        assert!(job.logs[0].starts_with("success: "));

        let path = job.report_path.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let row_numbers: Vec<String> = text
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(2).unwrap().to_string())
            .collect();
        assert_eq!(row_numbers, vec!["1", "2", "3", "4"]);

        let stats = summarize_report(&path, &StatsPolicy::default()).unwrap();
        assert_eq!(stats.success, 4);
        assert_eq!(stats.columns["kind"]["even"], 2);
    }

    #[tokio::test]
    async fn test_row_failures_do_not_abort_the_job() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Arc::new(Flaky));

        let id = runner.submit(dataset(5)).await;
        let job = wait_until_done(&runner, id).await;

        assert_eq!(job.current, 5);
        let stats = summarize_report(job.report_path.as_ref().unwrap(), &StatsPolicy::default()).unwrap();
        assert_eq!(stats.success, 2);
        assert_eq!(stats.error, 3);
        assert!(job.logs[1].contains("timeout waiting for page"));
        assert!(job.logs[2].contains("panicked: selector not found"));
    }

    #[tokio::test]
    async fn test_empty_job_writes_header_only_report() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, Arc::new(SimulatedAction::new(Duration::ZERO)));

        let id = runner.submit(dataset(0)).await;
        let job = wait_until_done(&runner, id).await;

        assert_eq!(job.current, 0);
        let text = std::fs::read_to_string(job.report_path.unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_report_dir_still_finishes() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::default());
        let runner = JobRunner::new(
            store,
            Arc::new(SimulatedAction::new(Duration::ZERO)),
            1,
            dir.path().join("missing"),
        );

        let id = runner.submit(dataset(2)).await;
        let job = wait_until_done(&runner, id).await;

        assert!(job.report_path.is_none());
        assert_eq!(job.current, 2);
    }

    #[tokio::test]
    async fn test_sweep_removes_evicted_reports() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new(EvictionPolicy {
            max_entries: 1,
            ttl: Duration::from_secs(3600),
        }));
        let runner = JobRunner::new(store, Arc::new(SimulatedAction::new(Duration::ZERO)), 1, dir.path());

        let first = wait_until_done(&runner, runner.submit(dataset(1)).await).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = wait_until_done(&runner, runner.submit(dataset(1)).await).await;

        assert_eq!(runner.sweep().await, 1);
        assert!(!first.report_path.unwrap().exists());
        assert!(second.report_path.unwrap().exists());
        assert!(runner.store().get(first.id).await.is_none());
    }
}
