use std::path::Path;

use anyhow::Context;
use axum::http::StatusCode;
use bytes::Bytes;
use uuid::Uuid;

use super::{recommendations, temp::TempUpload};
use crate::{
    error::{AppError, AppResult},
    history::repo_types::{History, NewHistory},
    inference::{Classification, InferenceError},
    state::AppState,
    storage::{ext_from_mime, image_key},
};

/// One image taken off the multipart body.
#[derive(Debug, Clone)]
pub struct IncomingImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub history: History,
    pub recommendations: &'static [&'static str],
}

/// Classifies the image, stores it and records it in the caller's history.
///
/// The temp file lives only inside this call.
pub async fn analyze_upload(
    state: &AppState,
    user_id: Uuid,
    image: IncomingImage,
) -> AppResult<UploadOutcome> {
    let ext = ext_from_mime(&image.content_type).unwrap_or("bin");
    let temp = TempUpload::write(&state.config.upload.dir, ext, &image.bytes)
        .await
        .context("write temp upload")?;

    let outcome = classify_and_store(state, user_id, &image, temp.path()).await;
    temp.close();
    outcome
}

async fn classify_and_store(
    state: &AppState,
    user_id: Uuid,
    image: &IncomingImage,
    path: &Path,
) -> AppResult<UploadOutcome> {
    let prediction = match state
        .classifier
        .classify(path, &image.file_name, &image.content_type)
        .await
        .map_err(inference_error)?
    {
        Classification::Predicted(p) => p,
        Classification::Rejected { message } => {
            tracing::info!(%user_id, %message, "image rejected by classifier");
            return Err(AppError::Validation(message));
        }
    };

    let body = Bytes::from(tokio::fs::read(path).await.context("read temp upload")?);
    let key = image_key(user_id, &image.content_type);
    let stored = state
        .storage
        .put_object(&key, body, &image.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    let inserted = state
        .history
        .insert(NewHistory {
            user_id,
            image_url: stored.url.clone(),
            storage_key: Some(stored.key.clone()),
            result: prediction,
        })
        .await;
    let history = match inserted {
        Ok(h) => h,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_object(&stored.key).await {
                tracing::warn!(key = %stored.key, error = %cleanup, "orphaned stored image");
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        %user_id,
        history_id = %history.id,
        predicted = %history.result.predicted_class,
        "image analyzed"
    );
    let recommendations = recommendations::for_class(&history.result.predicted_class);
    Ok(UploadOutcome {
        history,
        recommendations,
    })
}

fn inference_error(e: InferenceError) -> AppError {
    match e {
        InferenceError::Status { status, message } => AppError::upstream(Some(status), message),
        InferenceError::EmptyResponse => AppError::upstream(
            Some(StatusCode::BAD_GATEWAY),
            "Inference service returned no prediction",
        ),
        InferenceError::Transport(cause) => {
            tracing::error!(%cause, "inference service unreachable");
            AppError::upstream(None, "Inference service unavailable")
        }
        InferenceError::Io(io) => AppError::Internal(anyhow::Error::new(io).context("read upload")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    fn png() -> IncomingImage {
        IncomingImage {
            file_name: "eye.png".into(),
            content_type: "image/png".into(),
            bytes: Bytes::from_static(b"\x89PNG fundus"),
        }
    }

    #[tokio::test]
    async fn success_records_one_row_and_cleans_up() {
        let ctx = TestContext::new();
        let user = Uuid::new_v4();
        ctx.classifier.predict("DR");

        let out = analyze_upload(&ctx.state, user, png()).await.unwrap();
        assert_eq!(out.history.result.predicted_class, "DR");
        assert_eq!(out.recommendations, recommendations::for_class("DR"));
        assert_eq!(ctx.history.count_for(user), 1);
        assert_eq!(ctx.temp_files(), 0);

        let key = out.history.storage_key.clone().unwrap();
        assert!(key.starts_with(&format!("history/{user}/")));
        assert!(key.ends_with(".png"));
        assert_eq!(ctx.storage.stored(&key).unwrap(), Bytes::from_static(b"\x89PNG fundus"));
        assert!(out.history.image_url.ends_with(&key));
        assert_eq!(ctx.classifier.last_file_name().as_deref(), Some("eye.png"));
    }

    #[tokio::test]
    async fn rejection_is_bad_request_without_row() {
        let ctx = TestContext::new();
        let user = Uuid::new_v4();
        ctx.classifier.reject("Not a valid fundus image.");

        let err = analyze_upload(&ctx.state, user, png()).await.unwrap_err();
        match err {
            AppError::Validation(msg) => assert_eq!(msg, "Not a valid fundus image."),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ctx.history.count_for(user), 0);
        assert!(ctx.storage.keys().is_empty());
        assert_eq!(ctx.temp_files(), 0);
    }

    #[tokio::test]
    async fn storage_failure_leaves_no_row() {
        let ctx = TestContext::new();
        let user = Uuid::new_v4();
        ctx.classifier.predict("Normal");
        ctx.storage.fail_puts();

        let err = analyze_upload(&ctx.state, user, png()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ctx.history.count_for(user), 0);
        assert_eq!(ctx.temp_files(), 0);
    }

    #[tokio::test]
    async fn failed_insert_removes_stored_image() {
        let ctx = TestContext::new();
        let user = Uuid::new_v4();
        ctx.classifier.predict("DR");
        ctx.history.fail_inserts();

        let err = analyze_upload(&ctx.state, user, png()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ctx.history.count_for(user), 0);
        assert_eq!(ctx.temp_files(), 0);
        assert!(ctx.storage.keys().is_empty());

        let deleted = ctx.storage.deleted();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].starts_with(&format!("history/{user}/")));
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through() {
        let ctx = TestContext::new();
        let user = Uuid::new_v4();
        ctx.classifier
            .fail_with(StatusCode::UNPROCESSABLE_ENTITY, "Multiple retinas detected");

        let err = analyze_upload(&ctx.state, user, png()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "Multiple retinas detected");
        assert_eq!(ctx.temp_files(), 0);
    }

    #[tokio::test]
    async fn unknown_class_gets_no_advice() {
        let ctx = TestContext::new();
        ctx.classifier.predict("Cataract");

        let out = analyze_upload(&ctx.state, Uuid::new_v4(), png()).await.unwrap();
        assert!(out.recommendations.is_empty());
    }

    #[test]
    fn empty_inference_answer_is_bad_gateway() {
        let err = inference_error(InferenceError::EmptyResponse);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err = inference_error(InferenceError::Transport("connection refused".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("refused"));
    }
}
