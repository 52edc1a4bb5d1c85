use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::inference::Prediction;

/// Feedback attached to a single prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFeedback {
    pub rating: u8,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One uploaded and classified image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    #[serde(skip_serializing)]
    pub storage_key: Option<String>,
    pub result: Prediction,
    pub feedback: Option<HistoryFeedback>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewHistory {
    pub user_id: Uuid,
    pub image_url: String,
    pub storage_key: Option<String>,
    pub result: Prediction,
}

#[derive(Debug, FromRow)]
pub struct HistoryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub storage_key: Option<String>,
    pub predicted_class: String,
    pub severity: Option<String>,
    pub feedback_rating: Option<i16>,
    pub feedback_comment: Option<String>,
    pub feedback_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl From<HistoryRow> for History {
    fn from(r: HistoryRow) -> Self {
        let feedback = match (r.feedback_rating, r.feedback_at) {
            (Some(rating), Some(created_at)) => Some(HistoryFeedback {
                rating: rating.clamp(1, 5) as u8,
                comment: r.feedback_comment.unwrap_or_default(),
                created_at,
            }),
            _ => None,
        };
        Self {
            id: r.id,
            user_id: r.user_id,
            image_url: r.image_url,
            storage_key: r.storage_key,
            result: Prediction {
                predicted_class: r.predicted_class,
                severity: r.severity,
            },
            feedback,
            created_at: r.created_at,
        }
    }
}
