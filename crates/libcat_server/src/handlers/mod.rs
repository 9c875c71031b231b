pub mod accounts;
pub mod catalog;
pub mod roles;

use crate::error::AppError;
use axum::http::Uri;
use axum::Json;
use serde::Serialize;

/// Where successful catalog writes and logins redirect.
pub const BOOKS_PATH: &str = "/books/";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: libcat_core::core_version(),
    })
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
