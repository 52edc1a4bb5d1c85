use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Errors surfaced at the request boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid or expired OTP")]
    InvalidOrExpiredCode,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("Reset token expired. Please request a new password reset.")]
    ResetTokenExpired,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("Authentication failed")]
    Unauthenticated,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified")]
    VerificationRequired { user_id: Uuid },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Upstream {
        status: Option<StatusCode>,
        message: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Covers oversized bodies too, which are reported as 400 rather than 413.
impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Validation(err.body_text())
    }
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn upstream(status: Option<StatusCode>, msg: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Conflict(_)
            | AppError::InvalidOrExpiredCode
            | AppError::AlreadyVerified
            | AppError::ResetTokenExpired
            | AppError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::TokenExpired | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::VerificationRequired { .. } | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { status, .. } => {
                status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({ "success": false, "message": self.to_string() });

        match &self {
            AppError::Unauthenticated => {
                body["needsLogin"] = Value::Bool(true);
            }
            AppError::TokenExpired => {
                body["tokenExpired"] = Value::Bool(true);
            }
            AppError::VerificationRequired { user_id } => {
                body["requiresVerification"] = Value::Bool(true);
                body["userId"] = json!(user_id);
            }
            AppError::Upstream { message, .. } => {
                error!(%status, %message, "upstream failure");
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                body["message"] = json!("Internal Server Error");
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
