//! Workbook routes
//!
//! `GET /` serves the upload page. `POST /` carries all three workbook steps:
//!
//! | Body                                | Step                    |
//! |-------------------------------------|-------------------------|
//! | `multipart/form-data` with `file`   | upload                  |
//! | urlencoded with `action=mapping`    | column mapping          |
//! | urlencoded with `action=filter`     | row selection           |

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Router,
};

use super::commands::{
    map_columns, select_rows, upload, MapColumnsCommand, SelectRowsCommand, UploadCommand,
};
use super::form::FormFields;
use crate::api::response::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::session::SessionId;

const INDEX_HTML: &str = include_str!("index.html");

pub fn workbook_routes() -> Router<FeatureState> {
    Router::new().route("/", get(index).post(submit))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// POST /
#[tracing::instrument(skip_all, fields(session = %session))]
async fn submit(
    State(state): State<FeatureState>,
    Extension(session): Extension<SessionId>,
    request: Request,
) -> AppResult<Response> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let command = read_upload(multipart).await?;
        let response = upload::handle(&state, session, command).await?;
        return Ok(ApiResponse::success(response).into_response());
    }

    let body = Bytes::from_request(request, &state)
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    let form = FormFields::parse(&body);

    match form.get("action") {
        Some("mapping") => {
            let command = MapColumnsCommand::from_form(&form);
            let response = map_columns::handle(&state, session, command).await?;
            Ok(ApiResponse::success(response).into_response())
        },
        Some("filter") => {
            let command = SelectRowsCommand::from_form(&form);
            let response = select_rows::handle(&state, session, command).await?;
            Ok(ApiResponse::success(response).into_response())
        },
        Some(other) => Err(AppError::BadRequest(format!("Unknown form action: {}", other))),
        None => Err(AppError::BadRequest(
            "Expected a file upload or an action field".to_string(),
        )),
    }
}

async fn read_upload(mut multipart: Multipart) -> AppResult<UploadCommand> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file bytes: {}", e)))?;

        return Ok(UploadCommand {
            file_name,
            content: content.to_vec(),
        });
    }

    Err(AppError::BadRequest("No file selected".to_string()))
}
