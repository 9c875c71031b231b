//! Role-gated pages. Roles are checked on the profile only; group
//! permissions play no part here.

use crate::error::{AppError, AppResult};
use axum::{Extension, Json};
use libcat_core::{is_admin, is_librarian, is_member, AuthzError, Principal, Role};
use log::warn;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RolePage {
    pub role: Role,
    pub username: String,
}

pub async fn admin_view(Extension(principal): Extension<Principal>) -> AppResult<Json<RolePage>> {
    role_page(&principal, Role::Admin, is_admin)
}

pub async fn librarian_view(
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<RolePage>> {
    role_page(&principal, Role::Librarian, is_librarian)
}

pub async fn member_view(Extension(principal): Extension<Principal>) -> AppResult<Json<RolePage>> {
    role_page(&principal, Role::Member, is_member)
}

fn role_page(
    principal: &Principal,
    role: Role,
    passes: fn(&Principal) -> bool,
) -> AppResult<Json<RolePage>> {
    let username = principal.user().map(|user| user.username.clone());
    if !passes(principal) {
        warn!(
            "event=authz_denied module=roles status=denied role={role} user={}",
            username.as_deref().unwrap_or("anonymous")
        );
        return Err(AppError::Forbidden(
            AuthzError::RoleRequired { role, username }.to_string(),
        ));
    }
    Ok(Json(RolePage {
        role,
        username: username.unwrap_or_default(),
    }))
}
