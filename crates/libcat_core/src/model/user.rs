//! User accounts and role profiles.
//!
//! # Responsibility
//! - Define the custom user record and its one-to-one role profile.
//! - Validate account fields before they reach storage.
//!
//! # Invariants
//! - Every persisted user has exactly one `UserProfile`.
//! - A fresh profile has role `Member`.
//! - `password_hash` never leaves the repository layer in serialized output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type UserId = i64;

pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9@.+_-]+$").expect("valid username regex"));
static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid date regex"));

/// Application-level role stored on a user's profile.
///
/// Roles are flat: no role implies another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Librarian,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Librarian => "Librarian",
            Self::Member => "Member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Admin" => Some(Self::Admin),
            "Librarian" => Some(Self::Librarian),
            "Member" => Some(Self::Member),
            _ => None,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// ISO `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub profile_photo: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub role: Role,
}

/// Input for creating an account. The password is plaintext until the
/// account service hashes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: Option<String>,
    pub profile_photo: Option<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Validates every field except username uniqueness, which needs storage.
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        match self.validation_errors().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// All field failures, at most one per field, in form order.
    pub fn validation_errors(&self) -> Vec<AccountValidationError> {
        let email = (!self.email.is_empty() && !looks_like_email(&self.email))
            .then_some(AccountValidationError::InvalidEmail);
        let date_of_birth = self
            .date_of_birth
            .as_deref()
            .filter(|date| !DATE_RE.is_match(date))
            .map(|_| AccountValidationError::InvalidDateOfBirth);

        [
            validate_username(&self.username).err(),
            validate_password(&self.password).err(),
            email,
            date_of_birth,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Account field validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    BlankUsername,
    UsernameTooLong,
    UsernameCharset,
    PasswordTooShort,
    PasswordEntirelyNumeric,
    PasswordMismatch,
    InvalidEmail,
    InvalidDateOfBirth,
}

impl AccountValidationError {
    /// Form field the error is reported against.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankUsername | Self::UsernameTooLong | Self::UsernameCharset => "username",
            Self::PasswordTooShort | Self::PasswordEntirelyNumeric => "password1",
            Self::PasswordMismatch => "password2",
            Self::InvalidEmail => "email",
            Self::InvalidDateOfBirth => "date_of_birth",
        }
    }
}

impl Display for AccountValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankUsername => write!(f, "username must not be blank"),
            Self::UsernameTooLong => {
                write!(f, "username must be at most {USERNAME_MAX_CHARS} characters")
            }
            Self::UsernameCharset => write!(
                f,
                "username may contain only letters, digits and @/./+/-/_ characters"
            ),
            Self::PasswordTooShort => {
                write!(f, "password must contain at least {PASSWORD_MIN_CHARS} characters")
            }
            Self::PasswordEntirelyNumeric => write!(f, "password must not be entirely numeric"),
            Self::PasswordMismatch => write!(f, "the two password fields didn't match"),
            Self::InvalidEmail => write!(f, "enter a valid email address"),
            Self::InvalidDateOfBirth => write!(f, "date of birth must be YYYY-MM-DD"),
        }
    }
}

impl Error for AccountValidationError {}

pub fn validate_username(username: &str) -> Result<(), AccountValidationError> {
    if username.trim().is_empty() {
        return Err(AccountValidationError::BlankUsername);
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Err(AccountValidationError::UsernameTooLong);
    }
    if !USERNAME_RE.is_match(username) {
        return Err(AccountValidationError::UsernameCharset);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AccountValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(AccountValidationError::PasswordTooShort);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AccountValidationError::PasswordEntirelyNumeric);
    }
    Ok(())
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_only_exact_names() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("Librarian"), Some(Role::Librarian));
        assert_eq!(Role::parse("Member"), Some(Role::Member));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::default(), Role::Member);
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("alice.b+c@x_y-z").is_ok());
        assert_eq!(
            validate_username(" "),
            Err(AccountValidationError::BlankUsername)
        );
        assert_eq!(
            validate_username("bob smith"),
            Err(AccountValidationError::UsernameCharset)
        );
        assert_eq!(
            validate_username(&"a".repeat(151)),
            Err(AccountValidationError::UsernameTooLong)
        );
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("correct horse").is_ok());
        assert_eq!(
            validate_password("short"),
            Err(AccountValidationError::PasswordTooShort)
        );
        assert_eq!(
            validate_password("1234567890"),
            Err(AccountValidationError::PasswordEntirelyNumeric)
        );
    }

    #[test]
    fn new_user_checks_optional_fields() {
        let mut user = NewUser::new("carol", "s3cret-pass");
        assert!(user.validate().is_ok());

        user.email = "not-an-email".to_string();
        assert_eq!(user.validate(), Err(AccountValidationError::InvalidEmail));

        user.email = "carol@example.org".to_string();
        user.date_of_birth = Some("1990-13-01".to_string());
        assert_eq!(
            user.validate(),
            Err(AccountValidationError::InvalidDateOfBirth)
        );

        user.date_of_birth = Some("1990-12-01".to_string());
        assert!(user.validate().is_ok());
    }

    #[test]
    fn validation_errors_cover_every_failing_field() {
        let mut user = NewUser::new("bad name!", "123");
        user.email = "nope".to_string();
        assert_eq!(
            user.validation_errors(),
            vec![
                AccountValidationError::UsernameCharset,
                AccountValidationError::PasswordTooShort,
                AccountValidationError::InvalidEmail,
            ]
        );
        assert_eq!(user.validate(), Err(AccountValidationError::UsernameCharset));
    }
}
