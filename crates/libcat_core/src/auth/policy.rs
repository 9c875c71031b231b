//! Request-level authorization checks.
//!
//! # Responsibility
//! - Represent the identity behind a request (`Principal`).
//! - Answer permission checks from the precomputed effective permission set.
//! - Answer role predicates from the user's profile.
//!
//! # Invariants
//! - Anonymous principals hold no permission and no role.
//! - Inactive users hold no permission; active superusers hold all of them.
//! - Permission checks and role predicates never consult each other.

use crate::auth::permission::BookPermission;
use crate::model::user::{Role, User, UserProfile};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Authenticated user snapshot loaded once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user: User,
    pub profile: Option<UserProfile>,
    /// Union of direct grants and group grants.
    pub permissions: BTreeSet<BookPermission>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(Box<AuthenticatedUser>),
}

impl Principal {
    pub fn authenticated(
        user: User,
        profile: Option<UserProfile>,
        permissions: BTreeSet<BookPermission>,
    ) -> Self {
        Self::User(Box::new(AuthenticatedUser {
            user,
            profile,
            permissions,
        }))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::User(inner) => Some(&inner.user),
        }
    }

    pub fn has_perm(&self, permission: BookPermission) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User(inner) if !inner.user.is_active => false,
            Self::User(inner) if inner.user.is_superuser => true,
            Self::User(inner) => inner.permissions.contains(&permission),
        }
    }

    /// Fails with `AuthzError` instead of redirecting to a login page.
    pub fn require_permission(&self, permission: BookPermission) -> Result<(), AuthzError> {
        if self.has_perm(permission) {
            return Ok(());
        }
        Err(AuthzError::PermissionDenied {
            permission,
            username: self.user().map(|user| user.username.clone()),
        })
    }

    /// Authenticated, has a profile, and the profile role equals `role`.
    pub fn has_role(&self, role: Role) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User(inner) => inner.profile.is_some_and(|profile| profile.role == role),
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), AuthzError> {
        if self.has_role(role) {
            return Ok(());
        }
        Err(AuthzError::RoleRequired {
            role,
            username: self.user().map(|user| user.username.clone()),
        })
    }
}

pub fn is_admin(principal: &Principal) -> bool {
    principal.has_role(Role::Admin)
}

pub fn is_librarian(principal: &Principal) -> bool {
    principal.has_role(Role::Librarian)
}

pub fn is_member(principal: &Principal) -> bool {
    principal.has_role(Role::Member)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    PermissionDenied {
        permission: BookPermission,
        username: Option<String>,
    },
    RoleRequired {
        role: Role,
        username: Option<String>,
    },
}

impl Display for AuthzError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied { permission, .. } => {
                write!(f, "permission denied: {permission} required")
            }
            Self::RoleRequired { role, .. } => write!(f, "permission denied: {role} role required"),
        }
    }
}

impl Error for AuthzError {}
