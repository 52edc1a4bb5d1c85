use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::pipeline::{self, IncomingImage};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::AppJson,
    inference::Prediction,
    state::AppState,
};

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_routes(max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_image))
        .layer(DefaultBodyLimit::max(max_bytes + MULTIPART_OVERHEAD))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedHistory {
    pub id: Uuid,
    pub image_url: String,
    pub result: Prediction,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub history: UploadedHistory,
    pub recommendations: &'static [&'static str],
}

#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> AppResult<AppJson<UploadResponse>> {
    let image = read_image(multipart?, state.config.upload.max_bytes).await?;
    let out = pipeline::analyze_upload(&state, user.id, image).await?;

    Ok(AppJson(UploadResponse {
        message: "Image uploaded and analyzed successfully".into(),
        history: UploadedHistory {
            id: out.history.id,
            image_url: out.history.image_url,
            result: out.history.result,
            created_at: out.history.created_at,
        },
        recommendations: out.recommendations,
    }))
}

/// Takes the first `image` field; other fields are skipped.
async fn read_image(mut multipart: Multipart, max_bytes: usize) -> AppResult<IncomingImage> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::validation("Only image files are allowed"));
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?;
        if bytes.len() > max_bytes {
            return Err(AppError::validation(format!(
                "Image is too large (limit is {max_bytes} bytes)"
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::validation("No image file provided"));
        }
        return Ok(IncomingImage {
            file_name,
            content_type,
            bytes,
        });
    }
    Err(AppError::validation("No image file provided"))
}
