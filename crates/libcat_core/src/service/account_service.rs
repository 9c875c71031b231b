//! Account use-case service: registration, login sessions and grants.
//!
//! # Responsibility
//! - Validate and hash credentials before they reach the repository.
//! - Resolve a session token into a request `Principal`.
//! - Expose group, permission and role administration.
//!
//! # Invariants
//! - Every user created here gets exactly one `Member` profile.
//! - Unknown usernames and wrong passwords fail with the same error after
//!   the same Argon2 work.
//! - Inactive users cannot log in, and their sessions resolve to anonymous.
//! - Passwords and session tokens are never logged.
//!
//! Registration and login are also offered in split form
//! (`check_registration` / `register_hashed`, `begin_login` /
//! `LoginAttempt::verify` / `open_session`) so callers sharing one
//! connection can run the Argon2 step without holding it.

use crate::auth::group::DefaultGroup;
use crate::auth::password::{hash_password, verify_password, PasswordHashError};
use crate::auth::permission::{parse_permission, BookPermission};
use crate::auth::policy::Principal;
use crate::model::user::{AccountValidationError, NewUser, Role, User, UserId};
use crate::repo::catalog_repo::RepoError;
use crate::repo::session_repo::SessionRepository;
use crate::repo::user_repo::{UserCredentials, UserRepository};
use crate::service::form::{FormErrors, RegistrationForm};
use log::{info, warn};
use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Checked in place of a stored hash when the username is unknown.
static UNKNOWN_USER_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("libcat-unknown-user").ok());

#[derive(Debug)]
pub enum AccountServiceError {
    Invalid(FormErrors),
    InvalidCredentials,
    Repo(RepoError),
    Hash(PasswordHashError),
}

impl Display for AccountServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(errors) => write!(f, "invalid form: {errors}"),
            Self::InvalidCredentials => write!(f, "invalid username or password"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Hash(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccountServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Hash(err) => Some(err),
            Self::InvalidCredentials => None,
        }
    }
}

impl From<RepoError> for AccountServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Conflict(_) => Self::Invalid(username_taken_error()),
            other => Self::Repo(other),
        }
    }
}

impl From<FormErrors> for AccountServiceError {
    fn from(value: FormErrors) -> Self {
        Self::Invalid(value)
    }
}

impl From<PasswordHashError> for AccountServiceError {
    fn from(value: PasswordHashError) -> Self {
        Self::Hash(value)
    }
}

pub type AccountResult<T> = Result<T, AccountServiceError>;

/// A logged-in user and the token identifying their session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub user: User,
    pub token: String,
}

/// Stored credentials looked up for one login attempt. Verifying needs no
/// storage access.
pub struct LoginAttempt {
    credentials: Option<UserCredentials>,
}

impl LoginAttempt {
    /// Runs the Argon2 check and returns the user to open a session for.
    pub fn verify(self, password: &str) -> AccountResult<User> {
        let Some(credentials) = self.credentials else {
            if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
                let _ = verify_password(password, hash);
            }
            warn!("event=login module=accounts status=denied reason=unknown_user");
            return Err(AccountServiceError::InvalidCredentials);
        };

        if !verify_password(password, &credentials.password_hash)? {
            warn!(
                "event=login module=accounts status=denied reason=bad_password user_id={}",
                credentials.user.id
            );
            return Err(AccountServiceError::InvalidCredentials);
        }
        if !credentials.user.is_active {
            warn!(
                "event=login module=accounts status=denied reason=inactive user_id={}",
                credentials.user.id
            );
            return Err(AccountServiceError::InvalidCredentials);
        }
        Ok(credentials.user)
    }
}

pub struct AccountService<U: UserRepository, S: SessionRepository> {
    users: U,
    sessions: S,
}

impl<U: UserRepository, S: SessionRepository> AccountService<U, S> {
    pub fn new(users: U, sessions: S) -> Self {
        Self { users, sessions }
    }

    /// Validates, hashes and stores a new account with a `Member` profile.
    pub fn create_user(&self, new_user: &NewUser) -> AccountResult<User> {
        let mut errors = FormErrors::new();
        for err in new_user.validation_errors() {
            errors.add(err.field(), err.to_string());
        }
        self.check_username_available(&new_user.username, errors)?;

        let password_hash = hash_password(&new_user.password)?;
        self.store_user(new_user, &password_hash)
    }

    /// Binds the registration form and reports every field error at once,
    /// including a taken username.
    pub fn check_registration(&self, form: &RegistrationForm) -> AccountResult<NewUser> {
        let (new_user, errors) = bind_registration_form(form);
        self.check_username_available(&new_user.username, errors)?;
        Ok(new_user)
    }

    /// Stores an account checked by `check_registration` and logs it in.
    ///
    /// A username claimed since the check still fails as a form error.
    pub fn register_hashed(
        &self,
        new_user: &NewUser,
        password_hash: &str,
    ) -> AccountResult<LoginSession> {
        let user = self.store_user(new_user, password_hash)?;
        let token = self.sessions.create_session(user.id)?;
        info!(
            "event=user_registered module=accounts status=ok user_id={}",
            user.id
        );
        Ok(LoginSession { user, token })
    }

    /// Creates an account from the registration form and logs it in.
    pub fn register(&self, form: &RegistrationForm) -> AccountResult<LoginSession> {
        let new_user = self.check_registration(form)?;
        let password_hash = hash_password(&new_user.password)?;
        self.register_hashed(&new_user, &password_hash)
    }

    /// Looks up the stored credentials for `username`. Never fails for an
    /// unknown username; that surfaces from `LoginAttempt::verify`.
    pub fn begin_login(&self, username: &str) -> AccountResult<LoginAttempt> {
        Ok(LoginAttempt {
            credentials: self.users.find_credentials(username.trim())?,
        })
    }

    /// Starts a session for a user returned by `LoginAttempt::verify`.
    pub fn open_session(&self, user: User) -> AccountResult<LoginSession> {
        let token = self.sessions.create_session(user.id)?;
        info!("event=login module=accounts status=ok user_id={}", user.id);
        Ok(LoginSession { user, token })
    }

    pub fn login(&self, username: &str, password: &str) -> AccountResult<LoginSession> {
        let user = self.begin_login(username)?.verify(password)?;
        self.open_session(user)
    }

    /// Returns whether a session was removed.
    pub fn logout(&self, token: &str) -> AccountResult<bool> {
        Ok(self.sessions.delete_session(token)?)
    }

    /// Anonymous for a missing, unknown or inactive session.
    pub fn principal_for_session(&self, token: Option<&str>) -> AccountResult<Principal> {
        let Some(token) = token else {
            return Ok(Principal::Anonymous);
        };
        match self.sessions.user_for_session(token)? {
            Some(user_id) => self.principal_for_user(user_id),
            None => Ok(Principal::Anonymous),
        }
    }

    pub fn principal_for_user(&self, user_id: UserId) -> AccountResult<Principal> {
        let Some(user) = self.users.get_user(user_id)? else {
            return Ok(Principal::Anonymous);
        };
        if !user.is_active {
            return Ok(Principal::Anonymous);
        }
        let profile = self.users.get_profile(user_id)?;
        let permissions = self.users.effective_permissions(user_id)?;
        Ok(Principal::authenticated(user, profile, permissions))
    }

    /// Persists user fields; the profile is re-saved, never duplicated.
    pub fn save_user(&self, user: &User) -> AccountResult<()> {
        Ok(self.users.save_user(user)?)
    }

    pub fn set_role(&self, user_id: UserId, role: Role) -> AccountResult<()> {
        self.users.set_role(user_id, role)?;
        info!("event=role_changed module=accounts status=ok user_id={user_id} role={role}");
        Ok(())
    }

    /// Adds the user to one of the default groups, by group name.
    pub fn add_to_group(&self, user_id: UserId, group_name: &str) -> AccountResult<()> {
        let group = DefaultGroup::from_name(group_name).ok_or_else(|| {
            AccountServiceError::Invalid(FormErrors::single(
                "group",
                format!("unknown group `{group_name}`"),
            ))
        })?;
        self.users.add_to_group(user_id, group)?;
        info!(
            "event=group_joined module=accounts status=ok user_id={user_id} group={}",
            group.name()
        );
        Ok(())
    }

    /// Grants a direct permission given as `app_label.codename`.
    pub fn grant_permission(
        &self,
        user_id: UserId,
        permission: &str,
    ) -> AccountResult<BookPermission> {
        let permission = parse_permission(permission).map_err(|err| {
            AccountServiceError::Invalid(FormErrors::single("permission", err.to_string()))
        })?;
        self.users.grant_permission(user_id, permission)?;
        info!(
            "event=permission_granted module=accounts status=ok user_id={user_id} permission={permission}"
        );
        Ok(permission)
    }

    /// Fails with `errors`, plus a taken-username error when the name is
    /// otherwise valid but already in use.
    fn check_username_available(&self, username: &str, mut errors: FormErrors) -> AccountResult<()> {
        if errors.get("username").is_none() && self.users.username_taken(username)? {
            errors.add("username", USERNAME_TAKEN);
        }
        Ok(errors.into_result()?)
    }

    fn store_user(&self, new_user: &NewUser, password_hash: &str) -> AccountResult<User> {
        let user = self.users.create_user(new_user, password_hash)?;
        info!(
            "event=user_created module=accounts status=ok user_id={} superuser={}",
            user.id, user.is_superuser
        );
        Ok(user)
    }
}

const USERNAME_TAKEN: &str = "a user with that username already exists";

fn username_taken_error() -> FormErrors {
    FormErrors::single("username", USERNAME_TAKEN)
}

fn bind_registration_form(form: &RegistrationForm) -> (NewUser, FormErrors) {
    let new_user = NewUser {
        username: form.username.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password1.clone(),
        ..NewUser::default()
    };

    let mut errors = FormErrors::new();
    for err in new_user.validation_errors() {
        errors.add(err.field(), err.to_string());
    }
    if form.password1 != form.password2 {
        let mismatch = AccountValidationError::PasswordMismatch;
        errors.add(mismatch.field(), mismatch.to_string());
    }
    (new_user, errors)
}
