use axum::{extract::FromRef, http::StatusCode};
use lazy_static::lazy_static;
use rand::{Rng, RngCore};
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    google::GoogleIdentity,
    jwt::JwtKeys,
    password::{hash_password, verify_password, MIN_PASSWORD_LEN},
    repo_types::{AuthProvider, AuthProviders, Expiring, NewUser, ProviderKind, User},
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const OTP_TTL: Duration = Duration::minutes(10);
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Six decimal digits, never with a leading zero.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// 32 random bytes, hex encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn fresh_otp(now: OffsetDateTime) -> Expiring {
    Expiring {
        value: generate_otp(),
        expires_at: now + OTP_TTL,
    }
}

fn check_password_rules(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

async fn send_otp(state: &AppState, user: &User) -> AppResult<()> {
    let otp = user
        .verification_otp
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("user {} has no pending otp", user.id))?;
    state
        .mailer
        .send_verification(&user.email, &otp.value)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, user_id = %user.id, "verification email failed");
            AppError::upstream(None, "Failed to send verification email")
        })
}

/// Registers a password identity and mails an OTP. Returns the user id to verify.
pub async fn signup(state: &AppState, email: &str, password: &str, name: &str) -> AppResult<Uuid> {
    let email = normalize_email(email);
    let name = name.trim();
    if email.is_empty() || password.is_empty() || name.is_empty() {
        return Err(AppError::validation(
            "All fields are required: email, password and name",
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }
    check_password_rules(password)?;

    let now = OffsetDateTime::now_utc();
    let hash = hash_password(password)?;

    let user = match state.users.find_by_email(&email).await? {
        Some(mut user) => {
            match user.providers.local_verified() {
                Some(true) => {
                    warn!(user_id = %user.id, "signup for registered email");
                    return Err(AppError::Conflict("Email already registered".into()));
                }
                Some(false) => {
                    user.providers.set_password(&email, hash, false);
                }
                None => {
                    user.providers.link(AuthProvider::Local {
                        email: email.clone(),
                        password_hash: hash,
                        verified: false,
                    });
                }
            }
            user.verification_otp = Some(fresh_otp(now));
            state.users.save(&user).await?;
            info!(user_id = %user.id, "local identity added to existing user");
            user
        }
        None => {
            let user = state
                .users
                .create(NewUser {
                    email: email.clone(),
                    name: name.to_string(),
                    is_verified: false,
                    providers: AuthProviders::single(AuthProvider::Local {
                        email: email.clone(),
                        password_hash: hash,
                        verified: false,
                    }),
                    profile_picture: None,
                    verification_otp: Some(fresh_otp(now)),
                })
                .await?;
            info!(user_id = %user.id, "user registered");
            user
        }
    };

    send_otp(state, &user).await?;
    Ok(user.id)
}

pub async fn verify_email(state: &AppState, user_id: Uuid, otp: &str) -> AppResult<()> {
    let mut user = load_user(state, user_id).await?;
    if !user.needs_verification() {
        return Err(AppError::AlreadyVerified);
    }

    let now = OffsetDateTime::now_utc();
    match &user.verification_otp {
        Some(code) if code.value == otp.trim() && code.is_live(now) => {}
        _ => {
            warn!(%user_id, "otp mismatch or expired");
            return Err(AppError::InvalidOrExpiredCode);
        }
    }

    user.is_verified = true;
    user.providers.set_local_verified(true);
    user.verification_otp = None;
    state.users.save(&user).await?;
    info!(%user_id, "email verified");
    Ok(())
}

pub async fn resend_otp(state: &AppState, user_id: Uuid) -> AppResult<()> {
    let mut user = load_user(state, user_id).await?;
    if !user.needs_verification() {
        return Err(AppError::AlreadyVerified);
    }
    user.verification_otp = Some(fresh_otp(OffsetDateTime::now_utc()));
    state.users.save(&user).await?;
    send_otp(state, &user).await
}

/// Password sign-in. Unknown email, missing password identity and a wrong password
/// are indistinguishable to the caller.
pub async fn signin(state: &AppState, email: &str, password: &str) -> AppResult<(String, User)> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!("signin for unknown email");
        return Err(AppError::InvalidCredentials);
    };
    let Some(hash) = user.providers.password_hash() else {
        warn!(user_id = %user.id, "signin without local identity");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, hash)? {
        warn!(user_id = %user.id, "signin invalid password");
        return Err(AppError::InvalidCredentials);
    }
    if user.needs_verification() {
        return Err(AppError::VerificationRequired { user_id: user.id });
    }

    let token = JwtKeys::from_ref(state).sign(user.id)?;
    info!(user_id = %user.id, "user signed in");
    Ok((token, user))
}

pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<()> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    let mut user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let token = generate_reset_token();
    user.password_reset = Some(Expiring {
        value: token.clone(),
        expires_at: OffsetDateTime::now_utc() + RESET_TOKEN_TTL,
    });
    state.users.save(&user).await?;

    let link = format!(
        "{}/reset-password/{}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    );
    state
        .mailer
        .send_password_reset(&user.email, &link)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, user_id = %user.id, "password reset email failed");
            AppError::upstream(None, "Error sending password reset email")
        })?;
    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

pub async fn reset_password(state: &AppState, token: &str, new_password: &str) -> AppResult<()> {
    if token.is_empty() || new_password.is_empty() {
        return Err(AppError::validation("Token and new password are required."));
    }
    check_password_rules(new_password)?;

    let mut user = state
        .users
        .find_by_reset_token(token)
        .await?
        .ok_or(AppError::InvalidResetToken)?;
    let live = user
        .password_reset
        .as_ref()
        .is_some_and(|r| r.value == token && r.is_live(OffsetDateTime::now_utc()));
    if !live {
        return Err(AppError::ResetTokenExpired);
    }

    let hash = hash_password(new_password)?;
    let email = user.email.clone();
    let verified = user.is_verified;
    user.providers.set_password(&email, hash, verified);
    user.password_reset = None;
    state.users.save(&user).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

/// Signs in (or up) with a verified Google identity. Returns the session token, the
/// user and whether the user still lacks a password.
pub async fn google_sign_in(state: &AppState, id_token: &str) -> AppResult<(String, User, bool)> {
    let verifier = state.google.as_ref().ok_or_else(|| {
        AppError::upstream(
            Some(StatusCode::SERVICE_UNAVAILABLE),
            "Google sign-in is not configured",
        )
    })?;
    let identity = verifier
        .verify(id_token)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "google verification failed");
            AppError::upstream(None, "Authentication failed")
        })?
        .ok_or(AppError::Unauthenticated)?;

    let user = upsert_google_user(state, identity).await?;
    let token = JwtKeys::from_ref(state).sign(user.id)?;
    let needs_password = !user.providers.has(ProviderKind::Local);
    Ok((token, user, needs_password))
}

async fn upsert_google_user(state: &AppState, identity: GoogleIdentity) -> AppResult<User> {
    let email = normalize_email(&identity.email);
    let binding = AuthProvider::Google {
        provider_id: identity.sub.clone(),
        email: email.clone(),
        verified: true,
    };

    if let Some(mut user) = state.users.find_by_email(&email).await? {
        if user.providers.link(binding) {
            user.is_verified = true;
            if user.profile_picture.is_none() {
                user.profile_picture = identity.picture;
            }
            state.users.save(&user).await?;
            info!(user_id = %user.id, "google identity linked");
        }
        return Ok(user);
    }

    let name = identity
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let user = state
        .users
        .create(NewUser {
            email,
            name,
            is_verified: true,
            providers: AuthProviders::single(binding),
            profile_picture: identity.picture,
            verification_otp: None,
        })
        .await?;
    info!(user_id = %user.id, "user registered via google");
    Ok(user)
}

/// Sets the caller's password, linking a password identity if needed.
pub async fn set_password(
    state: &AppState,
    caller: &User,
    user_id: Uuid,
    password: &str,
) -> AppResult<()> {
    if caller.id != user_id {
        return Err(AppError::forbidden("Not authorized to change this password"));
    }
    check_password_rules(password)?;
    let mut user = load_user(state, user_id).await?;
    let hash = hash_password(password)?;
    let email = user.email.clone();
    let verified = user.is_verified;
    user.providers.set_password(&email, hash, verified);
    state.users.save(&user).await?;
    info!(%user_id, "password set");
    Ok(())
}

/// Adds an already-verified password identity for a user who has none.
pub async fn setup_local_auth(state: &AppState, caller: &User, password: &str) -> AppResult<()> {
    check_password_rules(password)?;
    if caller.providers.has(ProviderKind::Local) {
        return Ok(());
    }
    let mut user = caller.clone();
    user.providers.link(AuthProvider::Local {
        email: user.email.clone(),
        password_hash: hash_password(password)?,
        verified: true,
    });
    state.users.save(&user).await?;
    info!(user_id = %user.id, "local auth set up");
    Ok(())
}
