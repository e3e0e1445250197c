use super::blocking;
use crate::models::{MediaDraft, MediaPatch, MediaRecord, StoredAttachment};
use crate::services::{media, upload, validation};
use crate::web::error::{ApiError, AppResult};
use crate::web::extractors::{ApiJson, ApiPath};
use crate::web::state::AppState;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

const FILE_FIELD: &str = "file";

/// POST /media
pub async fn create_media(
    State(state): State<Arc<AppState>>,
    ApiJson(draft): ApiJson<MediaDraft>,
) -> AppResult<(StatusCode, Json<MediaRecord>)> {
    let record = blocking(move || {
        let validated = validation::validate_media(draft)?;
        Ok(media::create_media(&state.db, validated)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /media
pub async fn list_media(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<MediaRecord>>> {
    let records = blocking(move || Ok(media::list_media(&state.db)?)).await?;
    Ok(Json(records))
}

/// GET /media/:id
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MediaRecord>> {
    let record = blocking(move || Ok(media::get_media(&state.db, id)?)).await?;
    Ok(Json(record))
}

/// PUT /media/:id
pub async fn update_media(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<MediaPatch>,
) -> AppResult<Json<MediaRecord>> {
    let record = blocking(move || Ok(media::update_media(&state.db, id, patch)?)).await?;
    Ok(Json(record))
}

/// DELETE /media/:id
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    blocking(move || {
        let record = media::delete_media(&state.db, id)?;
        if let Some(filename) = record.attachment_filename {
            state.uploads.discard(&filename);
        }
        Ok(())
    })
    .await?;

    Ok(Json(json!({ "status": "deleted" })))
}

/// POST /media/:id/attachment
pub async fn upload_attachment(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<StoredAttachment>)> {
    let mut multipart = multipart?;

    let lookup = state.clone();
    blocking(move || Ok(media::get_media(&lookup.db, id)?)).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| ApiError::BadRequest {
        title: "Invalid Upload",
        detail: format!("Multipart field '{}' is required", FILE_FIELD),
    })?;

    tracing::debug!(media_id = %id, declared_filename = %filename, size_bytes = data.len(), "Received attachment");

    let stored = blocking(move || {
        Ok(upload::validate_and_store(
            &state.db,
            &state.uploads,
            id,
            &data,
            &filename,
        )?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(stored)))
}
