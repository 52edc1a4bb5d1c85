use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base used to build the public URL of an uploaded object.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailchimpConfig {
    pub api_key: String,
    pub server_prefix: String,
    pub audience_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub inference_url: String,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub smtp: Option<SmtpConfig>,
    /// Recipient of contact and product feedback mails.
    pub contact_inbox: String,
    pub mailchimp: Option<MailchimpConfig>,
    pub google_client_id: Option<String>,
}

pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_required(key: &str) -> anyhow::Result<String> {
    env_opt(key).with_context(|| format!("{key} must be set"))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: env_required("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "optiguard"),
            audience: env_or("JWT_AUDIENCE", "optiguard-users"),
            ttl_minutes: env_opt("JWT_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
        };

        let storage = StorageConfig {
            endpoint: env_required("STORAGE_ENDPOINT")?,
            bucket: env_or("STORAGE_BUCKET", "optiguard"),
            access_key: env_required("STORAGE_ACCESS_KEY")?,
            secret_key: env_required("STORAGE_SECRET_KEY")?,
            region: env_or("STORAGE_REGION", "us-east-1"),
            public_url: env_opt("STORAGE_PUBLIC_URL")
                .or_else(|| env_opt("STORAGE_ENDPOINT"))
                .unwrap_or_default(),
        };

        let upload = UploadConfig {
            dir: PathBuf::from(env_or("UPLOAD_DIR", "./uploads/temp")),
            max_bytes: env_opt("UPLOAD_MAX_BYTES")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_UPLOAD_MAX_BYTES),
        };

        let smtp = match (
            env_opt("SMTP_HOST"),
            env_opt("SMTP_USERNAME"),
            env_opt("SMTP_PASSWORD"),
            env_opt("SMTP_FROM_EMAIL"),
        ) {
            (Some(host), Some(username), Some(password), Some(from_email)) => Some(SmtpConfig {
                host,
                port: env_opt("SMTP_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(465),
                username,
                password,
                from_email,
                from_name: env_opt("SMTP_FROM_NAME"),
            }),
            _ => None,
        };

        let contact_inbox = env_opt("CONTACT_INBOX")
            .or_else(|| smtp.as_ref().map(|s| s.from_email.clone()))
            .unwrap_or_else(|| "support@optiguard.local".into());

        let mailchimp = match (
            env_opt("MAILCHIMP_API_KEY"),
            env_opt("MAILCHIMP_SERVER_PREFIX"),
            env_opt("MAILCHIMP_AUDIENCE_ID"),
        ) {
            (Some(api_key), Some(server_prefix), Some(audience_id)) => Some(MailchimpConfig {
                api_key,
                server_prefix,
                audience_id,
            }),
            _ => None,
        };

        let cors_origins = env_opt("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_opt("APP_PORT")
                .map(|v| v.parse::<u16>())
                .transpose()
                .context("APP_PORT must be a port number")?
                .unwrap_or(5000),
            database_url,
            jwt,
            storage,
            upload,
            inference_url: env_or("INFERENCE_URL", "http://127.0.0.1:8000/upload"),
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5173"),
            cors_origins,
            smtp,
            contact_inbox,
            mailchimp,
            google_client_id: env_opt("GOOGLE_CLIENT_ID"),
        })
    }
}

impl AppConfig {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
