use axum::{extract::State, routing::post, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{repo::Feedback, services};
use crate::{auth::AuthUser, error::AppResult, extract::AppJson, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/contact", post(contact))
        .route("/user/feedback", post(feedback))
        .route("/user/subscribe", post(subscribe))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackRequest {
    pub rating: Option<i64>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
    pub feedback: Feedback,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    pub message: String,
    pub data: Value,
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
async fn contact(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<ContactRequest>,
) -> AppResult<AppJson<SuccessResponse>> {
    services::contact(&state, &user, &payload.message).await?;
    Ok(AppJson(SuccessResponse {
        success: true,
        message: "Your message has been sent successfully".into(),
    }))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
async fn feedback(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<FeedbackRequest>,
) -> AppResult<AppJson<FeedbackResponse>> {
    let feedback =
        services::submit_feedback(&state, &user, payload.rating, &payload.message).await?;
    Ok(AppJson(FeedbackResponse {
        success: true,
        message: "Thank you for your feedback".into(),
        feedback,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<AppJson<SubscribeResponse>> {
    let data = services::subscribe(&state, &user).await?;
    Ok(AppJson(SubscribeResponse {
        success: true,
        message: "Subscribed successfully".into(),
        data,
    }))
}
