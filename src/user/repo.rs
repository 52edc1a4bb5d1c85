use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Product feedback left from the app. Never edited after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub rating: u8,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct FeedbackRow {
    id: Uuid,
    user_id: Uuid,
    rating: i16,
    message: String,
    created_at: OffsetDateTime,
}

impl From<FeedbackRow> for Feedback {
    fn from(r: FeedbackRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            rating: r.rating.clamp(1, 5) as u8,
            message: r.message,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
pub trait FeedbackRepo: Send + Sync {
    async fn insert(&self, user_id: Uuid, rating: u8, message: &str) -> anyhow::Result<Feedback>;
}

#[derive(Clone)]
pub struct PgFeedbackRepo {
    db: PgPool,
}

impl PgFeedbackRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FeedbackRepo for PgFeedbackRepo {
    async fn insert(&self, user_id: Uuid, rating: u8, message: &str) -> anyhow::Result<Feedback> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            r#"
            INSERT INTO feedback (user_id, rating, message)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, rating, message, created_at
            "#,
        )
        .bind(user_id)
        .bind(rating as i16)
        .bind(message)
        .fetch_one(&self.db)
        .await
        .context("insert feedback")?;
        Ok(row.into())
    }
}
