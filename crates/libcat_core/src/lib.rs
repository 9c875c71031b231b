//! Core domain logic for the library catalog.
//! This crate is the single source of truth for business invariants.

pub mod auth;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod security;
pub mod service;

pub use auth::group::{provision_default_groups, remove_default_groups, DefaultGroup};
pub use auth::permission::{parse_permission, BookPermission, PermissionParseError};
pub use auth::policy::{is_admin, is_librarian, is_member, AuthzError, Principal};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::catalog::{Author, Book, BookDraft, Librarian, Library, LibraryDetail};
pub use model::user::{NewUser, Role, User, UserProfile};
pub use repo::catalog_repo::{
    BookListQuery, CatalogRepository, RepoError, RepoResult, SqliteCatalogRepository,
};
pub use repo::session_repo::{SessionRepository, SqliteSessionRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use security::headers::{SecurityHeaderPolicy, SecuritySettings};
pub use service::account_service::{
    AccountService, AccountServiceError, LoginAttempt, LoginSession,
};
pub use service::catalog_service::{
    authorize_book_access, CatalogService, CatalogServiceError, EditBookContext,
};
pub use service::form::{BookForm, BookSearchForm, FormErrors, RegistrationForm};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
