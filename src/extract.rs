use axum::{extract::FromRequest, response::IntoResponse};
use serde::Serialize;

use crate::error::AppError;

/// `Json` whose rejections use the API's error shape (400 with a message).
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T: Serialize> IntoResponse for AppJson<T> {
    fn into_response(self) -> axum::response::Response {
        axum::Json(self.0).into_response()
    }
}
