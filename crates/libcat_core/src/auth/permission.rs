//! Book permission declarations and `app_label.codename` parsing.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// App label under which book permissions are registered.
pub const BOOK_APP_LABEL: &str = "relationship_app";

/// Custom permissions declared on the `Book` model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BookPermission {
    View,
    Create,
    Edit,
    Delete,
}

impl BookPermission {
    pub const ALL: [BookPermission; 4] = [Self::View, Self::Create, Self::Edit, Self::Delete];

    /// Stable codename stored in the `permissions` table.
    pub fn codename(self) -> &'static str {
        match self {
            Self::View => PERMISSION_CAN_VIEW,
            Self::Create => PERMISSION_CAN_CREATE,
            Self::Edit => PERMISSION_CAN_EDIT,
            Self::Delete => PERMISSION_CAN_DELETE,
        }
    }

    /// Human-readable permission name.
    pub fn name(self) -> &'static str {
        match self {
            Self::View => "Can view",
            Self::Create => "Can create",
            Self::Edit => "Can edit",
            Self::Delete => "Can delete",
        }
    }

    /// Fully qualified `app_label.codename` form.
    pub fn qualified(self) -> String {
        format!("{BOOK_APP_LABEL}.{}", self.codename())
    }

    pub fn from_codename(codename: &str) -> Option<Self> {
        match codename {
            PERMISSION_CAN_VIEW => Some(Self::View),
            PERMISSION_CAN_CREATE => Some(Self::Create),
            PERMISSION_CAN_EDIT => Some(Self::Edit),
            PERMISSION_CAN_DELETE => Some(Self::Delete),
            _ => None,
        }
    }
}

impl Display for BookPermission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{BOOK_APP_LABEL}.{}", self.codename())
    }
}

pub const PERMISSION_CAN_VIEW: &str = "can_view";
pub const PERMISSION_CAN_CREATE: &str = "can_create";
pub const PERMISSION_CAN_EDIT: &str = "can_edit";
pub const PERMISSION_CAN_DELETE: &str = "can_delete";

/// Parses a permission string of the form `app_label.codename`.
pub fn parse_permission(value: &str) -> Result<BookPermission, PermissionParseError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(PermissionParseError::Empty);
    }

    let (app_label, codename) = normalized
        .split_once('.')
        .ok_or_else(|| PermissionParseError::MissingAppLabel(normalized.to_string()))?;

    if app_label != BOOK_APP_LABEL {
        return Err(PermissionParseError::UnknownAppLabel(app_label.to_string()));
    }

    BookPermission::from_codename(codename)
        .ok_or_else(|| PermissionParseError::UnknownCodename(codename.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionParseError {
    Empty,
    MissingAppLabel(String),
    UnknownAppLabel(String),
    UnknownCodename(String),
}

impl Display for PermissionParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "permission value must not be empty"),
            Self::MissingAppLabel(value) => {
                write!(f, "permission must be `app_label.codename`, got `{value}`")
            }
            Self::UnknownAppLabel(label) => write!(f, "unknown permission app label: {label}"),
            Self::UnknownCodename(codename) => write!(f, "unknown permission codename: {codename}"),
        }
    }
}

impl Error for PermissionParseError {}
