use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{History, HistoryFeedback, HistoryRow, NewHistory};

#[async_trait]
pub trait HistoryRepo: Send + Sync {
    async fn insert(&self, item: NewHistory) -> anyhow::Result<History>;
    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<History>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<History>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
    async fn set_feedback(&self, id: Uuid, feedback: HistoryFeedback) -> anyhow::Result<History>;
}

const HISTORY_COLUMNS: &str = "id, user_id, image_url, storage_key, predicted_class, severity, \
     feedback_rating, feedback_comment, feedback_at, created_at";

#[derive(Clone)]
pub struct PgHistoryRepo {
    db: PgPool,
}

impl PgHistoryRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryRepo for PgHistoryRepo {
    async fn insert(&self, item: NewHistory) -> anyhow::Result<History> {
        let sql = format!(
            r#"
            INSERT INTO history (user_id, image_url, storage_key, predicted_class, severity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {HISTORY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(item.user_id)
            .bind(&item.image_url)
            .bind(&item.storage_key)
            .bind(&item.result.predicted_class)
            .bind(&item.result.severity)
            .fetch_one(&self.db)
            .await
            .context("insert history")?;
        Ok(row.into())
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<History>> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await
            .context("list history by user")?;
        Ok(rows.into_iter().map(History::from).collect())
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<History>> {
        let sql = format!("SELECT {HISTORY_COLUMNS} FROM history WHERE id = $1");
        let row = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find history")?;
        Ok(row.map(History::from))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM history WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete history")?;
        Ok(())
    }

    async fn set_feedback(&self, id: Uuid, feedback: HistoryFeedback) -> anyhow::Result<History> {
        let sql = format!(
            r#"
            UPDATE history
               SET feedback_rating = $2, feedback_comment = $3, feedback_at = $4
             WHERE id = $1
            RETURNING {HISTORY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(id)
            .bind(feedback.rating as i16)
            .bind(&feedback.comment)
            .bind(feedback.created_at)
            .fetch_one(&self.db)
            .await
            .context("set history feedback")?;
        Ok(row.into())
    }
}
