//! Fundus image upload: classify, store, record.

mod handlers;
pub mod pipeline;
pub mod recommendations;
pub mod temp;

use axum::Router;

use crate::state::AppState;

pub fn router(max_bytes: usize) -> Router<AppState> {
    handlers::upload_routes(max_bytes)
}
