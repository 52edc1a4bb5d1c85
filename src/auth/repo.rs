use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User, UserRow};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> anyhow::Result<User>;
    /// Persists every mutable field of the user.
    async fn save(&self, user: &User) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, email, name, is_verified, auth_providers, profile_picture, \
     otp_code, otp_expires_at, reset_token, reset_expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_where(&self, clause: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {clause}"))?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_where("email", email).await
    }

    async fn find_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        self.find_where("reset_token", token).await
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<User> {
        anyhow::ensure!(!user.providers.is_empty(), "user needs an auth provider");
        let (otp_code, otp_expires_at) = match user.verification_otp {
            Some(otp) => (Some(otp.value), Some(otp.expires_at)),
            None => (None, None),
        };
        let sql = format!(
            r#"
            INSERT INTO users (email, name, is_verified, auth_providers, profile_picture,
                               otp_code, otp_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.is_verified)
            .bind(Json(&user.providers))
            .bind(&user.profile_picture)
            .bind(otp_code)
            .bind(otp_expires_at)
            .fetch_one(&self.db)
            .await
            .context("insert user")?;
        Ok(row.into())
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        anyhow::ensure!(!user.providers.is_empty(), "user needs an auth provider");
        let otp = user.verification_otp.as_ref();
        let reset = user.password_reset.as_ref();
        sqlx::query(
            r#"
            UPDATE users
               SET name = $2,
                   is_verified = $3,
                   auth_providers = $4,
                   profile_picture = $5,
                   otp_code = $6,
                   otp_expires_at = $7,
                   reset_token = $8,
                   reset_expires_at = $9,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(user.is_verified)
        .bind(Json(&user.providers))
        .bind(&user.profile_picture)
        .bind(otp.map(|o| o.value.as_str()))
        .bind(otp.map(|o| o.expires_at))
        .bind(reset.map(|r| r.value.as_str()))
        .bind(reset.map(|r| r.expires_at))
        .execute(&self.db)
        .await
        .context("update user")?;
        Ok(())
    }
}
