use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::History;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub history_id: Option<Uuid>,
}

/// Feedback on one prediction. Fields are optional here so that a missing
/// value is answered with a 400 message rather than a parse error.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryFeedbackRequest {
    pub history_id: Option<Uuid>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryListResponse {
    pub history: Vec<History>,
}

#[derive(Debug, Serialize)]
pub struct HistoryItemResponse {
    pub message: String,
    pub history: History,
}
