use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{
        ForgotPasswordRequest, GoogleAuthRequest, GoogleAuthResponse, MessageResponse,
        ProfileUser, PublicUser, ResendOtpRequest, ResetPasswordRequest, SetPasswordRequest,
        SetupLocalAuthRequest, SigninRequest, SigninResponse, SignupRequest, SignupResponse,
        VerifyEmailRequest, VerifyEmailResponse,
    },
    extractors::AuthUser,
    services,
};
use crate::{error::AppResult, extract::AppJson, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/verify-email", post(verify_email))
        .route("/auth/resend-otp", post(resend_otp))
        .route("/auth/resend-verification", post(resend_otp))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/google", post(google))
        .route("/auth/set-password", post(set_password))
        .route("/auth/setup-local-auth", post(setup_local_auth))
        .route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, AppJson<SignupResponse>)> {
    let user_id =
        services::signup(&state, &payload.email, &payload.password, &payload.name).await?;
    Ok((
        StatusCode::CREATED,
        AppJson(SignupResponse {
            message: "Registration successful! Please check your email for OTP verification."
                .into(),
            user_id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SigninRequest>,
) -> AppResult<AppJson<SigninResponse>> {
    let (token, user) = services::signin(&state, &payload.email, &payload.password).await?;
    Ok(AppJson(SigninResponse {
        success: true,
        token,
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip(state, payload), fields(user_id = %payload.user_id))]
pub async fn verify_email(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyEmailRequest>,
) -> AppResult<AppJson<VerifyEmailResponse>> {
    services::verify_email(&state, payload.user_id, &payload.otp).await?;
    Ok(AppJson(VerifyEmailResponse {
        message: "Email verified successfully. You can now login.".into(),
        verified: true,
    }))
}

#[instrument(skip(state, payload), fields(user_id = %payload.user_id))]
pub async fn resend_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResendOtpRequest>,
) -> AppResult<AppJson<MessageResponse>> {
    services::resend_otp(&state, payload.user_id).await?;
    Ok(AppJson(MessageResponse::new("New OTP sent successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<AppJson<MessageResponse>> {
    services::forgot_password(&state, &payload.email).await?;
    Ok(AppJson(MessageResponse::new("Password reset email sent")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> AppResult<AppJson<MessageResponse>> {
    services::reset_password(&state, &payload.token, &payload.new_password).await?;
    Ok(AppJson(MessageResponse::new("Password reset successful")))
}

#[instrument(skip(state, payload))]
pub async fn google(
    State(state): State<AppState>,
    AppJson(payload): AppJson<GoogleAuthRequest>,
) -> AppResult<AppJson<GoogleAuthResponse>> {
    let (token, user, needs_password) = services::google_sign_in(&state, &payload.token).await?;
    Ok(AppJson(GoogleAuthResponse {
        message: "Authentication successful".into(),
        token,
        user: ProfileUser::from(&user),
        needs_password,
    }))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(payload): AppJson<SetPasswordRequest>,
) -> AppResult<AppJson<MessageResponse>> {
    services::set_password(&state, &caller, payload.user_id, &payload.password).await?;
    Ok(AppJson(MessageResponse::new("Password set successfully")))
}

#[instrument(skip(state, caller, payload), fields(user_id = %caller.id))]
pub async fn setup_local_auth(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    AppJson(payload): AppJson<SetupLocalAuthRequest>,
) -> AppResult<AppJson<MessageResponse>> {
    services::setup_local_auth(&state, &caller, &payload.password).await?;
    Ok(AppJson(MessageResponse::new(
        "Local authentication setup successfully",
    )))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> AppJson<ProfileUser> {
    AppJson(ProfileUser::from(&user))
}
