//! Upload command
//!
//! Saves an uploaded spreadsheet into the upload directory, parses it, and makes
//! it the session's current file. A file that does not parse is discarded and
//! the session keeps its previous state.

use std::path::{Path, PathBuf};

use rowpilot_common::types::Scalar;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::session::SessionId;
use crate::tabular::{loader::load_table_as, SourceFormat};

#[derive(Debug, Clone)]
pub struct UploadCommand {
    /// Client-supplied file name
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub file_name: String,
    pub columns: Vec<String>,
    /// First rows of the table, row-major
    pub rows: Vec<Vec<Scalar>>,
    pub row_count: usize,
    /// Target fields offered by fixed-schema mapping, empty when it is off
    pub fixed_fields: Vec<String>,
}

impl UploadCommand {
    pub fn validate(&self) -> AppResult<SourceFormat> {
        if self.file_name.trim().is_empty() {
            return Err(AppError::BadRequest("No file selected".to_string()));
        }
        Ok(SourceFormat::from_path(&self.file_name)?)
    }

    /// The stored file name: the last path component with unsafe characters replaced
    pub fn sanitized_file_name(&self) -> String {
        let base = self
            .file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();

        base.chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[tracing::instrument(skip(state, command), fields(session = %session, file_name = %command.file_name))]
pub async fn handle(
    state: &FeatureState,
    session: SessionId,
    command: UploadCommand,
) -> AppResult<UploadResponse> {
    let format = command.validate()?;

    let path = state
        .settings
        .upload_dir
        .join(format!("{}_{}", session, command.sanitized_file_name()));
    let staging = staging_path(&path);

    tokio::fs::write(&staging, &command.content).await?;

    let load_path = staging.clone();
    let loaded = tokio::task::spawn_blocking(move || load_table_as(&load_path, format)).await?;

    let table = match loaded {
        Ok(table) => table,
        Err(e) => {
            remove_quietly(&staging).await;
            return Err(e.into());
        },
    };

    tokio::fs::rename(&staging, &path).await?;

    let previous = state
        .sessions
        .update(session, |data| {
            data.dataset = None;
            data.selected_columns.clear();
            data.upload_path.replace(path.clone())
        })
        .await;

    if let Some(previous) = previous.filter(|p| *p != path) {
        remove_quietly(&previous).await;
    }

    info!(
        format = format.label(),
        columns = table.column_count(),
        rows = table.row_count(),
        "Spreadsheet uploaded"
    );

    let preview = table.preview(state.settings.preview_rows);

    Ok(UploadResponse {
        file_name: command.file_name,
        columns: preview.columns,
        rows: preview.rows,
        row_count: preview.total_rows,
        fixed_fields: state.settings.fixed_fields.clone(),
    })
}

/// Hidden per-request file next to `path` that the upload is parsed from
fn staging_path(path: &Path) -> PathBuf {
    path.with_file_name(format!(
        ".{}.{}.part",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("upload"),
        Uuid::new_v4()
    ))
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use rowpilot_common::RowpilotError;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> FeatureState {
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().to_path_buf();
        config.storage.report_dir = dir.path().to_path_buf();
        config.mapping.preview_rows = 2;
        config.mapping.fixed_fields = vec!["name".to_string(), "email".to_string()];
        FeatureState::from_config(&config)
    }

    fn command(file_name: &str, content: &str) -> UploadCommand {
        UploadCommand {
            file_name: file_name.to_string(),
            content: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_validation_rejects_blank_name() {
        assert!(matches!(
            command("  ", "a\n1\n").validate(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_validation_rejects_unknown_extension() {
        assert!(matches!(
            command("scan.pdf", "").validate(),
            Err(AppError::Domain(RowpilotError::UnsupportedFormat { .. }))
        ));
    }

    #[test]
    fn test_sanitized_file_name_strips_directories() {
        assert_eq!(command("../../etc/passwd.csv", "").sanitized_file_name(), "passwd.csv");
        assert_eq!(command("C:\\data\\my list.csv", "").sanitized_file_name(), "my_list.csv");
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_returns_preview() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let session = SessionId::new();

        let response = handle(&state, session, command("people.csv", "name,city\nAna,Lisboa\nRui,Porto\nEva,Faro\n"))
            .await
            .unwrap();

        assert_eq!(response.columns, vec!["name", "city"]);
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.row_count, 3);
        assert_eq!(response.fixed_fields, vec!["name", "email"]);

        let stored = state.sessions.get(session).await.upload_path.unwrap();
        assert!(stored.exists());
        assert!(stored.file_name().unwrap().to_str().unwrap().ends_with("_people.csv"));
    }

    #[test]
    fn test_staging_path_is_unique_per_request() {
        let path = Path::new("/uploads/abc_people.csv");

        let first = staging_path(path);
        let second = staging_path(path);

        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".abc_people.csv."));
        assert!(name.ends_with(".part"));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_of_same_name_both_succeed() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let session = SessionId::new();

        let (first, second) = tokio::join!(
            handle(&state, session, command("people.csv", "name\nAna\nRui\n")),
            handle(&state, session, command("people.csv", "name,city\nEva,Faro\n")),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        let stored = state.sessions.get(session).await.upload_path.unwrap();
        assert!(stored.exists());
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_failed_parse_leaves_session_untouched() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        let session = SessionId::new();

        handle(&state, session, command("good.csv", "a,b\n1,2\n")).await.unwrap();
        let before = state.sessions.get(session).await.upload_path;

        let err = handle(&state, session, command("bad.csv", "a,b\n1,2,3\n")).await.unwrap_err();

        assert!(matches!(err, AppError::Domain(RowpilotError::Parse { .. })));
        assert_eq!(state.sessions.get(session).await.upload_path, before);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
