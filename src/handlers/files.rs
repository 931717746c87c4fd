// src/handlers/files.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::{common::error::ApiError, config::AppState, middleware::i18n::Locale};

// GET /files/{*path}
// Download dos PDFs enviados pelos autores (a URL gravada no contrato aponta para cá)
pub async fn download_file(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = app_state
        .object_store
        .download(&path)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    let content_type = if path.ends_with(".pdf") {
        "application/pdf"
    } else {
        "application/octet-stream"
    };

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
