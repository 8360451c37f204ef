use crate::middleware::UserId;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use mongodb::bson::doc;
use service_core::error::AppError;

fn detect_content_type(storage_key: &str) -> &'static str {
    if storage_key.ends_with(".pdf") {
        "application/pdf"
    } else if storage_key.ends_with(".png") {
        "image/png"
    } else if storage_key.ends_with(".jpg") || storage_key.ends_with(".jpeg") {
        "image/jpeg"
    } else if storage_key.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

pub async fn download_file(
    State(state): State<AppState>,
    _user_id: UserId,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let file = state
        .db
        .files()
        .find_one(doc! { "_id": &file_id }, None)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("File not found")))?;

    let data = state
        .storage
        .download(&file.storage_key)
        .await
        .map_err(|e| {
            tracing::error!(
                file_id = %file_id,
                storage_key = %file.storage_key,
                error = %e,
                "Failed to download file"
            );
            AppError::NotFound(anyhow::anyhow!("File not found in storage"))
        })?;

    tracing::info!(
        file_id = %file_id,
        storage_key = %file.storage_key,
        size = data.len(),
        "File download completed"
    );

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                detect_content_type(&file.storage_key).to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", file.original_name),
            ),
        ],
        data,
    ))
}
