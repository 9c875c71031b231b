//! Registration, login and logout.
//!
//! Argon2 hashing and verification run on the blocking pool between two
//! short database sections, never while the connection lock is held.

use crate::error::{AppError, AppResult};
use crate::handlers::BOOKS_PATH;
use crate::session::{expired_session_cookie, session_cookie, session_token};
use crate::AppState;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect};
use axum::{Form, Json};
use libcat_core::auth::password::hash_password;
use libcat_core::{AccountServiceError, RegistrationForm};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationFormContext {
    pub fields: [&'static str; 4],
    pub required: [&'static str; 3],
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

pub async fn registration_form() -> Json<RegistrationFormContext> {
    Json(RegistrationFormContext {
        fields: ["username", "email", "password1", "password2"],
        required: ["username", "password1", "password2"],
    })
}

/// Creates the account, logs it in and redirects to the book list.
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> AppResult<impl IntoResponse> {
    let new_user = state.accounts(|accounts| accounts.check_registration(&form))?;
    let password = new_user.password.clone();
    let password_hash = run_blocking(move || Ok(hash_password(&password)?)).await?;
    let session =
        state.accounts(|accounts| accounts.register_hashed(&new_user, &password_hash))?;
    Ok((
        [(SET_COOKIE, session_cookie(&session.token))],
        Redirect::to(BOOKS_PATH),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<impl IntoResponse> {
    let attempt = state.accounts(|accounts| accounts.begin_login(&form.username))?;
    let password = form.password;
    let user = run_blocking(move || attempt.verify(&password)).await?;
    let session = state.accounts(|accounts| accounts.open_session(user))?;
    Ok((
        [(SET_COOKIE, session_cookie(&session.token))],
        Redirect::to(BOOKS_PATH),
    ))
}

async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AccountServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => Ok(result?),
        Err(err) => Err(AppError::Internal(format!("password task failed: {err}"))),
    }
}

/// Drops the server-side session, if any, and expires the cookie.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let logged_out = match session_token(&headers) {
        Some(token) => state.accounts(|accounts| accounts.logout(&token))?,
        None => false,
    };
    Ok((
        [(SET_COOKIE, expired_session_cookie())],
        Json(LogoutResponse { logged_out }),
    ))
}
