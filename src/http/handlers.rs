//! HTTP request handlers
//!
//! Implements handlers for the batch preparation endpoints.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use teddy_pcm::InputAudioFile;

use crate::error::ServerError;
use crate::http::cache::CacheStats;
use crate::state::{AppState, BatchManifest, PreparedBatch};

/// Extension trait for AppState
pub trait AppStateExt {
    fn get_batch_or_error(&self, batch_id: &str) -> Result<Arc<PreparedBatch>, ServerError>;

    /// Count `err` in the error metrics and hand it back
    fn fail(&self, err: ServerError) -> ServerError;
}

impl AppStateExt for AppState {
    fn get_batch_or_error(&self, batch_id: &str) -> Result<Arc<PreparedBatch>, ServerError> {
        self.get_batch(batch_id)
            .ok_or_else(|| self.fail(ServerError::BatchNotFound(batch_id.to_string())))
    }

    fn fail(&self, err: ServerError) -> ServerError {
        self.metrics.record_error(err.label());
        err
    }
}

fn multipart_error(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(err.body_text())
    } else {
        ServerError::BadRequest(err.body_text())
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> String {
    format!(
        "teddy-pcm-server v{} (FFmpeg {})",
        env!("CARGO_PKG_VERSION"),
        teddy_pcm::ffmpeg_version_info()
    )
}

/// Cache statistics endpoint
/// GET /debug/cache
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    state.metrics.record_request("/debug/cache");
    Json(state.cache_stats())
}

/// Prepare an upload batch
/// POST /api/pcm
///
/// Every multipart field is one input file, in upload order.
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BatchManifest>), ServerError> {
    state.metrics.record_request("/api/pcm");
    let orchestrator = state
        .orchestrator()
        .map_err(|e| state.fail(ServerError::Library(e)))?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.fail(multipart_error(e)))?
    {
        let index = files.len();
        let name = field
            .file_name()
            .or_else(|| field.name())
            .map(str::to_string)
            .unwrap_or_else(|| format!("file{}", index));
        let data = field
            .bytes()
            .await
            .map_err(|e| state.fail(multipart_error(e)))?;
        tracing::debug!(index, name = %name, bytes = data.len(), "received file");
        files.push(InputAudioFile::new(name, data, index));
    }

    if files.is_empty() {
        return Err(state.fail(ServerError::BadRequest(
            "upload contains no files".to_string(),
        )));
    }

    let outcome = {
        let _permit = Arc::clone(&state.conversion_slots)
            .acquire_owned()
            .await
            .map_err(|e| state.fail(ServerError::Internal(e.to_string())))?;
        orchestrator.run(files).await
    };

    let batch = state.register_batch(outcome);
    tracing::info!(
        batch_id = %batch.id,
        parts = batch.outcome.batch.len(),
        failures = batch.outcome.failures.len(),
        "prepared batch"
    );

    Ok((StatusCode::CREATED, Json(batch.manifest())))
}

/// Batch manifest endpoint
/// GET /api/pcm/{batch_id}
pub async fn get_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchManifest>, ServerError> {
    state.metrics.record_request("/api/pcm/{batch_id}");
    let batch = state.get_batch_or_error(&batch_id)?;
    Ok(Json(batch.manifest()))
}

/// Raw PCM of one part
/// GET /api/pcm/{batch_id}/parts/{part_name}
pub async fn get_part(
    State(state): State<Arc<AppState>>,
    Path((batch_id, part_name)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    state.metrics.record_request("/api/pcm/{batch_id}/parts");
    let batch = state.get_batch_or_error(&batch_id)?;
    let part = batch.part(&part_name).ok_or_else(|| {
        state.fail(ServerError::PartNotFound {
            batch_id: batch_id.clone(),
            part_name: part_name.clone(),
        })
    })?;

    let payload = part.payload().clone();
    state.metrics.record_bytes(payload.len() as u64);

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", part.part_name()),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        payload,
    )
        .into_response())
}

/// The whole batch as a ready-to-forward form body
/// GET /api/pcm/{batch_id}/multipart
pub async fn get_multipart(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Response, ServerError> {
    state.metrics.record_request("/api/pcm/{batch_id}/multipart");
    let batch = state.get_batch_or_error(&batch_id)?;

    let boundary = batch.boundary();
    let body = batch.outcome.batch.to_multipart(&boundary);
    state.metrics.record_bytes(body.len() as u64);

    Ok((
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        body,
    )
        .into_response())
}

/// Drop a prepared batch
/// DELETE /api/pcm/{batch_id}
pub async fn delete_batch(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.metrics.record_request("/api/pcm/{batch_id}/delete");
    state
        .remove_batch(&batch_id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| state.fail(ServerError::BatchNotFound(batch_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    #[tokio::test]
    async fn test_version_names_the_server() {
        assert!(version_check().await.starts_with("teddy-pcm-server v"));
    }

    #[test]
    fn test_missing_batch_is_counted() {
        let state = AppState::with_defaults();
        let err = state.get_batch_or_error("missing").unwrap_err();
        assert!(matches!(err, ServerError::BatchNotFound(_)));
        let output = state.metrics.export_prometheus(0, 0);
        assert!(output.contains("teddy_pcm_errors_total{type=\"batch_not_found\"} 1"));
    }
}
