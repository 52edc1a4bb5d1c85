use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Google,
}

/// One way of proving who the user is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum AuthProvider {
    Local {
        email: String,
        password_hash: String,
        verified: bool,
    },
    Google {
        provider_id: String,
        email: String,
        verified: bool,
    },
}

impl AuthProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            AuthProvider::Local { .. } => ProviderKind::Local,
            AuthProvider::Google { .. } => ProviderKind::Google,
        }
    }

    pub fn is_verified(&self) -> bool {
        match self {
            AuthProvider::Local { verified, .. } | AuthProvider::Google { verified, .. } => {
                *verified
            }
        }
    }
}

/// Provider bindings of a user, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthProviders(Vec<AuthProvider>);

impl AuthProviders {
    pub fn single(provider: AuthProvider) -> Self {
        Self(vec![provider])
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&AuthProvider> {
        self.0.iter().find(|p| p.kind() == kind)
    }

    pub fn has(&self, kind: ProviderKind) -> bool {
        self.get(kind).is_some()
    }

    /// Adds the binding unless one of the same kind exists. Returns whether it was added.
    pub fn link(&mut self, provider: AuthProvider) -> bool {
        if self.has(provider.kind()) {
            return false;
        }
        self.0.push(provider);
        true
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.0.iter().map(AuthProvider::kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn password_hash(&self) -> Option<&str> {
        match self.get(ProviderKind::Local)? {
            AuthProvider::Local { password_hash, .. } => Some(password_hash),
            AuthProvider::Google { .. } => None,
        }
    }

    /// Replaces the local password, linking a local binding if there is none.
    pub fn set_password(&mut self, email: &str, hash: String, verified_if_new: bool) {
        for p in self.0.iter_mut() {
            if let AuthProvider::Local { password_hash, .. } = p {
                *password_hash = hash;
                return;
            }
        }
        self.0.push(AuthProvider::Local {
            email: email.to_string(),
            password_hash: hash,
            verified: verified_if_new,
        });
    }

    pub fn set_local_verified(&mut self, value: bool) {
        for p in self.0.iter_mut() {
            if let AuthProvider::Local { verified, .. } = p {
                *verified = value;
            }
        }
    }

    pub fn local_verified(&self) -> Option<bool> {
        self.get(ProviderKind::Local).map(AuthProvider::is_verified)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiring {
    pub value: String,
    pub expires_at: OffsetDateTime,
}

impl Expiring {
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

/// User record.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_verified: bool,
    pub providers: AuthProviders,
    pub profile_picture: Option<String>,
    pub verification_otp: Option<Expiring>,
    pub password_reset: Option<Expiring>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Pending when either the account or its password binding still awaits an OTP.
    pub fn needs_verification(&self) -> bool {
        !self.is_verified || self.providers.local_verified() == Some(false)
    }
}

/// Fields needed to insert a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub is_verified: bool,
    pub providers: AuthProviders,
    pub profile_picture: Option<String>,
    pub verification_otp: Option<Expiring>,
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_verified: bool,
    pub auth_providers: Json<AuthProviders>,
    pub profile_picture: Option<String>,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<OffsetDateTime>,
    pub reset_token: Option<String>,
    pub reset_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

fn expiring(value: Option<String>, expires_at: Option<OffsetDateTime>) -> Option<Expiring> {
    Some(Expiring {
        value: value?,
        expires_at: expires_at?,
    })
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            name: r.name,
            is_verified: r.is_verified,
            providers: r.auth_providers.0,
            profile_picture: r.profile_picture,
            verification_otp: expiring(r.otp_code, r.otp_expires_at),
            password_reset: expiring(r.reset_token, r.reset_expires_at),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
