//! Column mapping command
//!
//! Re-reads the session's uploaded file and projects it onto target fields.
//! On success the mapped records replace whatever the session held; on a
//! validation failure the session is untouched and the error carries the
//! column list and preview so the form can be shown again.

use std::collections::HashMap;

use rowpilot_common::types::MappedRecord;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::super::form::FormFields;
use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::session::SessionId;
use crate::tabular::{load_table, map_fixed, map_free, ColumnSelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    Free,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapColumnsCommand {
    /// Chosen source columns with optional new names
    Free(Vec<ColumnSelection>),
    /// Target field to source column
    Fixed(HashMap<String, String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct MapColumnsResponse {
    pub mode: MappingMode,
    pub fields: Vec<String>,
    pub records: Vec<MappedRecord>,
    pub record_count: usize,
}

impl MapColumnsCommand {
    /// Read the mapping from form fields.
    ///
    /// `mode=fixed` selects fixed-schema mapping from `field_<target>` keys;
    /// otherwise every `selected_columns` value is picked, renamed by its
    /// `rename_<column>` value when present.
    pub fn from_form(form: &FormFields) -> Self {
        if form.get("mode") == Some("fixed") {
            let bindings = form
                .with_prefix("field_")
                .map(|(target, source)| (target.to_string(), source.to_string()))
                .collect();
            return MapColumnsCommand::Fixed(bindings);
        }

        let renames: HashMap<&str, &str> = form.with_prefix("rename_").collect();
        let selections = form
            .get_all("selected_columns")
            .into_iter()
            .map(|column| ColumnSelection {
                column: column.to_string(),
                rename: renames.get(column).map(|name| name.to_string()),
            })
            .collect();

        MapColumnsCommand::Free(selections)
    }

    pub fn mode(&self) -> MappingMode {
        match self {
            MapColumnsCommand::Free(_) => MappingMode::Free,
            MapColumnsCommand::Fixed(_) => MappingMode::Fixed,
        }
    }
}

#[tracing::instrument(skip(state, command), fields(session = %session, mode = ?command.mode()))]
pub async fn handle(
    state: &FeatureState,
    session: SessionId,
    command: MapColumnsCommand,
) -> AppResult<MapColumnsResponse> {
    let path = state
        .sessions
        .get(session)
        .await
        .upload_path
        .ok_or_else(|| AppError::NotFound("No uploaded file to map; upload a spreadsheet first".to_string()))?;

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(AppError::NotFound(
            "Uploaded file not found; upload it again".to_string(),
        ));
    }

    let table = tokio::task::spawn_blocking(move || load_table(&path)).await??;

    let mode = command.mode();
    let mapped = match &command {
        MapColumnsCommand::Free(selections) => map_free(&table, selections),
        MapColumnsCommand::Fixed(bindings) => {
            map_fixed(&table, &state.settings.fixed_fields, bindings)
        },
    };

    let dataset = mapped.map_err(|e| {
        AppError::from(e).with_details(json!({
            "columns": table.column_names(),
            "preview": table.preview(state.settings.preview_rows),
        }))
    })?;

    let response = MapColumnsResponse {
        mode,
        fields: dataset.fields.clone(),
        records: dataset.records.clone(),
        record_count: dataset.len(),
    };

    state
        .sessions
        .update(session, |data| {
            data.selected_columns = match mode {
                MappingMode::Free => dataset.fields.clone(),
                MappingMode::Fixed => Vec::new(),
            };
            data.dataset = Some(dataset);
        })
        .await;

    info!(fields = response.fields.len(), records = response.record_count, "Columns mapped");

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::features::workbook::commands::upload::{self, UploadCommand};
    use rowpilot_common::types::Scalar;
    use rowpilot_common::RowpilotError;
    use tempfile::TempDir;

    async fn uploaded(dir: &TempDir, fixed_fields: &[&str]) -> (FeatureState, SessionId) {
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().to_path_buf();
        config.mapping.fixed_fields = fixed_fields.iter().map(|f| f.to_string()).collect();
        let state = FeatureState::from_config(&config);
        let session = SessionId::new();

        upload::handle(
            &state,
            session,
            UploadCommand {
                file_name: "contacts.csv".to_string(),
                content: b"Nome,E-mail,Cidade\nAna,a@x,Lisboa\nRui,r@x,Porto\n".to_vec(),
            },
        )
        .await
        .unwrap();

        (state, session)
    }

    #[test]
    fn test_free_command_from_form() {
        let form = FormFields::parse(
            b"action=mapping&selected_columns=Nome&selected_columns=Cidade&rename_Nome=name&rename_Cidade=",
        );

        assert_eq!(
            MapColumnsCommand::from_form(&form),
            MapColumnsCommand::Free(vec![
                ColumnSelection::renamed("Nome", "name"),
                ColumnSelection::renamed("Cidade", ""),
            ])
        );
    }

    #[test]
    fn test_fixed_command_from_form() {
        let form = FormFields::parse(b"action=mapping&mode=fixed&field_name=Nome&field_email=E-mail");

        let MapColumnsCommand::Fixed(bindings) = MapColumnsCommand::from_form(&form) else {
            panic!("expected fixed mapping");
        };
        assert_eq!(bindings["email"], "E-mail");
    }

    #[tokio::test]
    async fn test_free_mapping_is_stored_in_session() {
        let dir = TempDir::new().unwrap();
        let (state, session) = uploaded(&dir, &[]).await;

        let response = handle(
            &state,
            session,
            MapColumnsCommand::Free(vec![ColumnSelection::renamed("Cidade", "city")]),
        )
        .await
        .unwrap();

        assert_eq!(response.fields, vec!["city"]);
        assert_eq!(response.record_count, 2);
        assert_eq!(response.records[1].get("city"), Some(&Scalar::from("Porto")));

        let data = state.sessions.get(session).await;
        assert_eq!(data.selected_columns, vec!["city"]);
        assert_eq!(data.dataset.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_fixed_field_keeps_previous_records() {
        let dir = TempDir::new().unwrap();
        let (state, session) = uploaded(&dir, &["name", "email"]).await;

        handle(
            &state,
            session,
            MapColumnsCommand::Free(vec![ColumnSelection::new("Nome")]),
        )
        .await
        .unwrap();

        let err = handle(
            &state,
            session,
            MapColumnsCommand::Fixed(HashMap::from([("name".to_string(), "Nome".to_string())])),
        )
        .await
        .unwrap_err();

        match err {
            AppError::WithDetails { source, details } => {
                assert!(matches!(
                    *source,
                    AppError::Domain(RowpilotError::MissingFields(ref fields)) if fields == &["email".to_string()]
                ));
                assert_eq!(details["columns"][0], "Nome");
            },
            other => panic!("unexpected error: {other:?}"),
        }

        let data = state.sessions.get(session).await;
        assert_eq!(data.dataset.unwrap().fields, vec!["Nome"]);
    }

    #[tokio::test]
    async fn test_mapping_without_upload_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (state, _) = uploaded(&dir, &[]).await;

        let err = handle(&state, SessionId::new(), MapColumnsCommand::Free(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
