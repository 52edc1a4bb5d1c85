//! Google ID-token verification against Google's published signing keys.

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleIdentity {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(None)` means the token is not acceptable; `Err` means the check itself failed.
    async fn verify(&self, id_token: &str) -> anyhow::Result<Option<GoogleIdentity>>;
}

pub struct GoogleCertVerifier {
    http: reqwest::Client,
    client_id: String,
}

impl GoogleCertVerifier {
    pub fn new(http: reqwest::Client, client_id: impl Into<String>) -> Self {
        Self {
            http,
            client_id: client_id.into(),
        }
    }

    async fn fetch_keys(&self) -> anyhow::Result<JwkSet> {
        self.http
            .get(GOOGLE_CERTS_URL)
            .send()
            .await
            .context("fetch google certs")?
            .error_for_status()
            .context("google certs status")?
            .json::<JwkSet>()
            .await
            .context("parse google certs")
    }
}

#[async_trait]
impl IdentityVerifier for GoogleCertVerifier {
    async fn verify(&self, id_token: &str) -> anyhow::Result<Option<GoogleIdentity>> {
        let Ok(header) = decode_header(id_token) else {
            return Ok(None);
        };
        let Some(kid) = header.kid else {
            return Ok(None);
        };

        let keys = self.fetch_keys().await?;
        let Some(jwk) = keys.find(&kid) else {
            tracing::warn!(%kid, "google token signed with unknown key");
            return Ok(None);
        };
        let key = DecodingKey::from_jwk(jwk).context("google jwk")?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(std::slice::from_ref(&self.client_id));
        validation.set_issuer(&GOOGLE_ISSUERS);

        match decode::<GoogleIdentity>(id_token, &key, &validation) {
            Ok(data) => Ok(Some(data.claims)),
            Err(e) => {
                tracing::warn!(error = %e, "google token rejected");
                Ok(None)
            }
        }
    }
}
