//! Per-row unit of work

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rowpilot_common::types::MappedRecord;

/// The action a job performs for each selected record.
///
/// An `Err` marks the row as failed with the error text as its message; the job
/// moves on to the next row either way.
#[async_trait]
pub trait RowAction: Send + Sync {
    /// Process one record. `row_number` is 1-based.
    async fn execute(&self, row_number: usize, record: &MappedRecord) -> Result<()>;
}

/// Stand-in action that waits a fixed delay and succeeds
#[derive(Debug, Clone)]
pub struct SimulatedAction {
    delay: Duration,
}

impl SimulatedAction {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl RowAction for SimulatedAction {
    async fn execute(&self, _row_number: usize, _record: &MappedRecord) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_action_waits_then_succeeds() {
        let action = SimulatedAction::new(Duration::from_secs(1));
        let started = tokio::time::Instant::now();

        action.execute(1, &MappedRecord::default()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
