//! Endpoint handlers: `/predict`, `/health`, `/diseases`.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;
use dermascan_core::pipeline::decode::format_to_string;
use dermascan_core::{HealthStatus, PredictionResult, ProcessingError};

use super::error::{ApiError, NOT_AN_IMAGE};
use super::state::SharedState;

/// Multipart field carrying the image.
const UPLOAD_FIELD: &str = "file";

/// A file pulled out of a multipart body.
struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Whether a declared content type is an image type.
fn is_image_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
}

/// Take the `file` field, or failing that the first field with a filename.
///
/// The content type is checked from the part headers before the body is
/// read, so a non-image upload is rejected whatever its size.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut fallback: Option<Result<Upload, ApiError>> = None;

    while let Some(field) = multipart.next_field().await? {
        let named_file = field.name() == Some(UPLOAD_FIELD);
        if !named_file && (fallback.is_some() || field.file_name().is_none()) {
            continue;
        }

        if !is_image_type(field.content_type()) {
            let rejected = ApiError::InvalidInput(NOT_AN_IMAGE.to_string());
            if named_file {
                return Err(rejected);
            }
            fallback = Some(Err(rejected));
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?.to_vec();
        let upload = Upload {
            file_name,
            content_type,
            bytes,
        };

        if named_file {
            return Ok(upload);
        }
        fallback = Some(Ok(upload));
    }

    fallback.unwrap_or_else(|| Err(ApiError::InvalidInput("No file uploaded".to_string())))
}

/// POST /predict - classify an uploaded image.
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart).await?;

    tracing::debug!(
        "Received {:?} ({}, {} bytes)",
        upload.file_name.as_deref().unwrap_or("upload"),
        upload.content_type.as_deref().unwrap_or_default(),
        upload.bytes.len()
    );

    let decoded = state.decoder.decode(upload.bytes).await?;
    tracing::debug!(
        "Decoded {} {}x{} ({} bytes)",
        format_to_string(decoded.format),
        decoded.width,
        decoded.height,
        decoded.byte_len
    );

    let classifier = state.classifier.clone();
    let classification =
        tokio::task::spawn_blocking(move || classifier.classify(&decoded.image))
            .await
            .map_err(|e| ProcessingError::Task {
                stage: "inference".to_string(),
                message: e.to_string(),
            })??;

    tracing::info!(
        "Predicted {:?} ({:.2}%)",
        classification.label,
        classification.confidence
    );

    Ok(Json(PredictionResult::new(classification, &state.knowledge)))
}

/// GET /health - liveness and model status.
pub async fn health(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(HealthStatus::healthy(state.model_loaded()))
}

/// GET /diseases - every label the knowledge base describes.
pub async fn diseases(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.knowledge.labels().map(str::to_string).collect())
}
