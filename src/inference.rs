//! Client for the external fundus classification service.

use std::path::Path;

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the classifier concluded about an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub predicted_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Predicted(Prediction),
    /// The service looked at the image and refused it (not a fundus image, several retinas, ...).
    Rejected { message: String },
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("inference service returned no prediction")]
    EmptyResponse,

    #[error("inference request failed: {0}")]
    Transport(String),

    #[error("read upload: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        image: &Path,
        file_name: &str,
        content_type: &str,
    ) -> Result<Classification, InferenceError>;
}

/// Raw body of the inference service. Every field is optional on the wire.
#[derive(Debug, Default, Deserialize)]
struct InferenceBody {
    predicted_class: Option<String>,
    severity: Option<String>,
    message: Option<String>,
}

impl InferenceBody {
    fn into_classification(self) -> Result<Classification, InferenceError> {
        match (self.predicted_class, self.message) {
            (Some(predicted_class), _) => Ok(Classification::Predicted(Prediction {
                predicted_class,
                severity: self.severity,
            })),
            (None, Some(message)) => Ok(Classification::Rejected { message }),
            (None, None) => Err(InferenceError::EmptyResponse),
        }
    }
}

pub struct HttpClassifier {
    http: reqwest::Client,
    url: String,
}

impl HttpClassifier {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        image: &Path,
        file_name: &str,
        content_type: &str,
    ) -> Result<Classification, InferenceError> {
        let file = tokio::fs::File::open(image).await?;
        let len = file.metadata().await?.len();
        let part = Part::stream_with_length(file, len)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| InferenceError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let res = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = res.status();
        let body = res.json::<InferenceBody>().await.unwrap_or_default();
        tracing::debug!(%status, predicted = ?body.predicted_class, "inference response");

        if !status.is_success() {
            let status = StatusCode::from_u16(status.as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            return Err(InferenceError::Status {
                status,
                message: body
                    .message
                    .unwrap_or_else(|| "Image rejected by inference service".into()),
            });
        }

        body.into_classification()
    }
}
