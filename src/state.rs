use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    auth::{
        google::{GoogleCertVerifier, IdentityVerifier},
        repo::{PgUserRepo, UserRepo},
    },
    config::AppConfig,
    email::{ConsoleMailer, Mailer, SmtpMailer},
    history::repo::{HistoryRepo, PgHistoryRepo},
    inference::{Classifier, HttpClassifier},
    newsletter::{Mailchimp, Newsletter},
    storage::{Storage, StorageClient},
    user::repo::{FeedbackRepo, PgFeedbackRepo},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub history: Arc<dyn HistoryRepo>,
    pub feedback: Arc<dyn FeedbackRepo>,
    pub storage: Arc<dyn StorageClient>,
    pub classifier: Arc<dyn Classifier>,
    pub mailer: Arc<dyn Mailer>,
    pub newsletter: Option<Arc<dyn Newsletter>>,
    pub google: Option<Arc<dyn IdentityVerifier>>,
}

impl AppState {
    /// Builds every client once. Returns the pool too so `main` can run migrations.
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(config);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to postgres")?;

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let http = reqwest::Client::builder()
            .build()
            .context("build http client")?;

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp, &config.contact_inbox)?),
            None => Arc::new(ConsoleMailer::new(config.contact_inbox.clone())),
        };
        if let Err(e) = mailer.verify().await {
            tracing::warn!(error = %e, "mail transport check failed; continuing");
        }

        let newsletter = config
            .mailchimp
            .as_ref()
            .map(|mc| Arc::new(Mailchimp::new(http.clone(), mc)) as Arc<dyn Newsletter>);
        let google = config.google_client_id.as_ref().map(|id| {
            Arc::new(GoogleCertVerifier::new(http.clone(), id.clone())) as Arc<dyn IdentityVerifier>
        });

        tokio::fs::create_dir_all(&config.upload.dir)
            .await
            .with_context(|| format!("create upload dir {}", config.upload.dir.display()))?;

        let state = Self {
            users: Arc::new(PgUserRepo::new(db.clone())),
            history: Arc::new(PgHistoryRepo::new(db.clone())),
            feedback: Arc::new(PgFeedbackRepo::new(db.clone())),
            storage,
            classifier: Arc::new(HttpClassifier::new(http, config.inference_url.clone())),
            mailer,
            newsletter,
            google,
            config,
        };
        Ok((state, db))
    }
}
