use axum::http::StatusCode;
use serde_json::Value;

use super::repo::Feedback;
use crate::{
    auth::repo_types::User,
    error::{AppError, AppResult},
    state::AppState,
};

pub async fn contact(state: &AppState, user: &User, message: &str) -> AppResult<()> {
    if message.trim().is_empty() {
        return Err(AppError::validation("Message is required"));
    }
    state
        .mailer
        .send_contact(&user.name, &user.email, message)
        .await?;
    tracing::info!(user_id = %user.id, "contact message forwarded");
    Ok(())
}

pub async fn submit_feedback(
    state: &AppState,
    user: &User,
    rating: Option<i64>,
    message: &str,
) -> AppResult<Feedback> {
    let Some(rating) = rating.filter(|_| !message.trim().is_empty()) else {
        return Err(AppError::validation("Rating and message are required"));
    };
    if !(1..=5).contains(&rating) {
        return Err(AppError::validation("Rating must be between 1 and 5"));
    }
    let rating = rating as u8;

    let feedback = state.feedback.insert(user.id, rating, message).await?;
    state
        .mailer
        .send_feedback(&user.email, rating, message)
        .await?;
    Ok(feedback)
}

pub async fn subscribe(state: &AppState, user: &User) -> AppResult<Value> {
    let newsletter = state.newsletter.as_ref().ok_or_else(|| {
        AppError::upstream(
            Some(StatusCode::SERVICE_UNAVAILABLE),
            "Newsletter is not configured",
        )
    })?;
    let data = newsletter.subscribe(&user.email).await?;
    tracing::info!(user_id = %user.id, "subscribed to newsletter");
    Ok(data)
}
