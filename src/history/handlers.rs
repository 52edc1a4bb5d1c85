use axum::{
    extract::{Query, State},
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{HistoryFeedbackRequest, HistoryItemResponse, HistoryListResponse, HistoryQuery},
    services,
};
use crate::{
    auth::{dto::MessageResponse, AuthUser},
    error::AppResult,
    extract::AppJson,
    state::AppState,
};

pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/api/history", get(list_history).delete(clear_history))
        .route("/api/history/feedback", post(add_feedback))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn list_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<AppJson<HistoryListResponse>> {
    let history = services::list(&state, user.id).await?;
    Ok(AppJson(HistoryListResponse { history }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn clear_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    query: Result<Query<HistoryQuery>, axum::extract::rejection::QueryRejection>,
) -> AppResult<AppJson<MessageResponse>> {
    let Query(query) = query?;
    let message = match query.history_id {
        Some(id) => {
            services::delete_one(&state, user.id, id).await?;
            "History item deleted successfully"
        }
        None => {
            services::delete_all(&state, user.id).await?;
            "All history cleared successfully"
        }
    };
    Ok(AppJson(MessageResponse::new(message)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
async fn add_feedback(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<HistoryFeedbackRequest>,
) -> AppResult<AppJson<HistoryItemResponse>> {
    let history = services::add_feedback(
        &state,
        user.id,
        payload.history_id,
        payload.rating,
        payload.comment,
    )
    .await?;
    Ok(AppJson(HistoryItemResponse {
        message: "Feedback added successfully".into(),
        history,
    }))
}
