//! HTTP adapter over `libcat_core`.
//!
//! # Responsibility
//! - Route catalog, account and role requests to core services.
//! - Resolve the session principal once per request.
//! - Attach the configured security headers to every response.
//!
//! # Invariants
//! - Handlers hold the database lock only for synchronous core calls and
//!   never across an `.await`. Password hashing is not one of those calls.
//! - Book routes check the permission before parsing path, query or body.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod session;

use crate::error::{AppError, AppResult};
use crate::handlers::{accounts, catalog, roles};
use crate::middleware::SecurityHeaders;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use libcat_core::{
    AccountService, AccountServiceError, CatalogService, CatalogServiceError,
    SecurityHeaderPolicy, SqliteCatalogRepository, SqliteSessionRepository,
    SqliteUserRepository,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body. Forms here are a few fields at most.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub type Catalog<'conn> = CatalogService<SqliteCatalogRepository<'conn>>;
pub type Accounts<'conn> =
    AccountService<SqliteUserRepository<'conn>, SqliteSessionRepository<'conn>>;

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    security_headers: Arc<SecurityHeaders>,
}

impl AppState {
    /// Fails when a configured header value cannot be sent over HTTP.
    pub fn new(conn: Connection, policy: &SecurityHeaderPolicy) -> Result<Self, String> {
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            security_headers: Arc::new(SecurityHeaders::from_policy(policy)?),
        })
    }

    pub fn security_headers(&self) -> &SecurityHeaders {
        &self.security_headers
    }

    pub fn with_db<T>(&self, work: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self
            .db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
        work(&conn)
    }

    pub fn catalog<T>(
        &self,
        work: impl FnOnce(&Catalog<'_>) -> Result<T, CatalogServiceError>,
    ) -> AppResult<T> {
        self.with_db(|conn| {
            let service = CatalogService::new(SqliteCatalogRepository::new(conn));
            Ok(work(&service)?)
        })
    }

    pub fn accounts<T>(
        &self,
        work: impl FnOnce(&Accounts<'_>) -> Result<T, AccountServiceError>,
    ) -> AppResult<T> {
        self.with_db(|conn| {
            let service = AccountService::new(
                SqliteUserRepository::new(conn),
                SqliteSessionRepository::new(conn),
            );
            Ok(work(&service)?)
        })
    }
}

/// Builds the application router.
///
/// Layers, outermost first: request log, security headers, body limit,
/// principal resolution.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/books/", get(catalog::list_books))
        .route(
            "/books/add",
            get(catalog::add_book_form).post(catalog::add_book),
        )
        .route(
            "/books/:id/edit",
            get(catalog::edit_book_form).post(catalog::edit_book),
        )
        .route(
            "/books/:id/delete",
            get(catalog::delete_book_confirmation).post(catalog::delete_book),
        )
        .route("/library/:id/", get(catalog::library_detail))
        .route(
            "/register/",
            get(accounts::registration_form).post(accounts::register),
        )
        .route("/login/", post(accounts::login))
        .route("/logout/", post(accounts::logout))
        .route("/admin-view/", get(roles::admin_view))
        .route("/librarian-view/", get(roles::librarian_view))
        .route("/member-view/", get(roles::member_view))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::resolve_principal,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::security_headers,
        ))
        .layer(from_fn(middleware::log_requests))
        .with_state(state)
}
