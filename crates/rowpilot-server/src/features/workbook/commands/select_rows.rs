//! Row selection command
//!
//! Narrows the session's mapped records to the submitted indices. The filtered
//! set replaces the stored one, so a second selection works on the result of the
//! first.

use rowpilot_common::types::MappedRecord;
use serde::Serialize;
use tracing::info;

use super::super::form::FormFields;
use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::session::SessionId;
use crate::tabular::{parse_indices, select_rows};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectRowsCommand {
    /// Row indices as submitted, 0-based
    pub indices: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectRowsResponse {
    pub fields: Vec<String>,
    pub records: Vec<MappedRecord>,
    /// Indices that matched a record
    pub selected: Vec<usize>,
    /// Indices outside the stored records, dropped
    pub ignored: Vec<i64>,
    /// The session holds records a job can start on
    pub ready: bool,
}

impl SelectRowsCommand {
    pub fn from_form(form: &FormFields) -> Self {
        Self {
            indices: form
                .get_all("selected")
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[tracing::instrument(skip(state, command), fields(session = %session, submitted = command.indices.len()))]
pub async fn handle(
    state: &FeatureState,
    session: SessionId,
    command: SelectRowsCommand,
) -> AppResult<SelectRowsResponse> {
    let indices = parse_indices(&command.indices)?;

    let outcome = state
        .sessions
        .update(session, |data| {
            let outcome = select_rows(data.dataset.as_ref()?, &indices);
            data.dataset = Some(outcome.dataset.clone());
            Some(outcome)
        })
        .await
        .ok_or_else(|| {
            AppError::BadRequest("No mapped records to select from; map columns first".to_string())
        })?;

    info!(
        kept = outcome.selected.len(),
        ignored = outcome.ignored.len(),
        "Rows selected"
    );

    Ok(SelectRowsResponse {
        fields: outcome.dataset.fields,
        records: outcome.dataset.records,
        selected: outcome.selected,
        ignored: outcome.ignored,
        ready: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rowpilot_common::types::{MappedDataset, Scalar};
    use rowpilot_common::RowpilotError;

    async fn state_with_records(n: i64) -> (FeatureState, SessionId) {
        let state = FeatureState::from_config(&Config::default());
        let session = SessionId::new();
        let records = (0..n)
            .map(|i| MappedRecord::new(vec![("n".to_string(), Scalar::Int(i))]))
            .collect();
        state
            .sessions
            .update(session, |data| {
                data.dataset = Some(MappedDataset::new(vec!["n".to_string()], records))
            })
            .await;
        (state, session)
    }

    fn command(indices: &[&str]) -> SelectRowsCommand {
        SelectRowsCommand {
            indices: indices.iter().map(|i| i.to_string()).collect(),
        }
    }

    #[test]
    fn test_from_form_collects_repeated_keys() {
        let form = FormFields::parse(b"action=filter&selected=0&selected=2");
        assert_eq!(SelectRowsCommand::from_form(&form), command(&["0", "2"]));
    }

    #[tokio::test]
    async fn test_selection_replaces_stored_records() {
        let (state, session) = state_with_records(3).await;

        let response = handle(&state, session, command(&["0", "2", "7"])).await.unwrap();

        assert_eq!(response.selected, vec![0, 2]);
        assert_eq!(response.ignored, vec![7]);
        assert!(response.ready);

        let stored = state.sessions.get(session).await.dataset.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored.records[1].get("n"), Some(&Scalar::Int(2)));
    }

    #[tokio::test]
    async fn test_non_integer_index_is_rejected_without_changes() {
        let (state, session) = state_with_records(3).await;

        let err = handle(&state, session, command(&["1", "x"])).await.unwrap_err();

        assert!(matches!(err, AppError::Domain(RowpilotError::InvalidRowIndex(_))));
        assert_eq!(state.sessions.get(session).await.dataset.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_selection_without_mapping_is_bad_request() {
        let state = FeatureState::from_config(&Config::default());
        let err = handle(&state, SessionId::new(), command(&["0"])).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
