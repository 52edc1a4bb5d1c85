use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{config::MailchimpConfig, error::AppError};

#[async_trait]
pub trait Newsletter: Send + Sync {
    /// Adds the address to the mailing list and returns the provider's member record.
    async fn subscribe(&self, email: &str) -> Result<Value, AppError>;
}

pub struct Mailchimp {
    http: reqwest::Client,
    base_url: String,
    audience_id: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MailchimpError {
    detail: Option<String>,
}

impl Mailchimp {
    pub fn new(http: reqwest::Client, cfg: &MailchimpConfig) -> Self {
        Self {
            http,
            base_url: format!("https://{}.api.mailchimp.com/3.0", cfg.server_prefix),
            audience_id: cfg.audience_id.clone(),
            api_key: cfg.api_key.clone(),
        }
    }
}

#[async_trait]
impl Newsletter for Mailchimp {
    async fn subscribe(&self, email: &str) -> Result<Value, AppError> {
        let url = format!("{}/lists/{}/members", self.base_url, self.audience_id);
        let res = self
            .http
            .post(&url)
            .basic_auth("anystring", Some(&self.api_key))
            .json(&json!({ "email_address": email, "status": "subscribed" }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "mailchimp request failed");
                AppError::upstream(None, "Failed to subscribe")
            })?;

        let status = res.status();
        if status.is_success() {
            return res
                .json::<Value>()
                .await
                .map_err(|e| AppError::Internal(e.into()));
        }

        let detail = res
            .json::<MailchimpError>()
            .await
            .ok()
            .and_then(|e| e.detail)
            .unwrap_or_else(|| "Failed to subscribe".into());
        tracing::warn!(%status, %detail, "mailchimp rejected subscription");
        // "Member Exists" and similar are 400s worth passing on; anything else is ours.
        let status = (status.as_u16() == 400).then_some(StatusCode::BAD_REQUEST);
        Err(AppError::upstream(status, detail))
    }
}
