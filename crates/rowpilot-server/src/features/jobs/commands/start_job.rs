//! Start job command
//!
//! Submits the session's current records to the job runner. The request returns
//! as soon as the job is registered; processing continues in the background.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::session::SessionId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: Uuid,
}

#[tracing::instrument(skip(state), fields(session = %session))]
pub async fn handle(state: &FeatureState, session: SessionId) -> AppResult<StartJobResponse> {
    let dataset = state.sessions.get(session).await.dataset.ok_or_else(|| {
        AppError::BadRequest("No mapped records to process; map columns first".to_string())
    })?;

    let job_id = state.runner.submit(dataset).await;

    Ok(StartJobResponse { job_id })
}
