use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{History, HistoryFeedback};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Loads a row and checks it belongs to `owner`.
async fn owned(state: &AppState, owner: Uuid, id: Uuid) -> AppResult<History> {
    let item = state
        .history
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found("History not found"))?;
    if item.user_id != owner {
        return Err(AppError::forbidden("Not authorized to access this history"));
    }
    Ok(item)
}

pub async fn list(state: &AppState, owner: Uuid) -> AppResult<Vec<History>> {
    Ok(state.history.list_by_user(owner).await?)
}

pub async fn delete_one(state: &AppState, owner: Uuid, id: Uuid) -> AppResult<()> {
    let item = owned(state, owner, id).await?;
    if let Some(key) = &item.storage_key {
        state.storage.delete_object(key).await?;
    }
    state.history.delete(item.id).await?;
    tracing::info!(history_id = %item.id, "history item deleted");
    Ok(())
}

/// Each row goes right after its image, so a failure part way leaves only
/// rows whose images still exist.
pub async fn delete_all(state: &AppState, owner: Uuid) -> AppResult<u64> {
    let items = state.history.list_by_user(owner).await?;
    let mut removed = 0;
    for item in &items {
        if let Some(key) = &item.storage_key {
            state.storage.delete_object(key).await?;
        }
        state.history.delete(item.id).await?;
        removed += 1;
    }
    tracing::info!(%owner, removed, "history cleared");
    Ok(removed)
}

pub async fn add_feedback(
    state: &AppState,
    owner: Uuid,
    history_id: Option<Uuid>,
    rating: Option<i64>,
    comment: Option<String>,
) -> AppResult<History> {
    let (Some(id), Some(rating)) = (history_id, rating) else {
        return Err(AppError::validation("History ID and rating are required"));
    };
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::validation("Rating must be between 1 and 5"));
    }

    let item = owned(state, owner, id).await?;
    let feedback = HistoryFeedback {
        rating: rating as u8,
        comment: comment.unwrap_or_default(),
        created_at: OffsetDateTime::now_utc(),
    };
    Ok(state.history.set_feedback(item.id, feedback).await?)
}
