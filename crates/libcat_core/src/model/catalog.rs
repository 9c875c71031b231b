//! Catalog records: authors, books, libraries and librarians.
//!
//! # Invariants
//! - Names and titles are non-blank and bounded by their column limits.
//! - A book always references an existing author (enforced by the repository).
//! - A library has at most one librarian.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AuthorId = i64;
pub type BookId = i64;
pub type LibraryId = i64;
pub type LibrarianId = i64;

pub const AUTHOR_NAME_MAX_CHARS: usize = 100;
pub const BOOK_TITLE_MAX_CHARS: usize = 200;
pub const LIBRARY_NAME_MAX_CHARS: usize = 150;
pub const LIBRARIAN_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
}

/// Book row joined with its author's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author_id: AuthorId,
    pub author_name: String,
}

impl Display for Book {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.title, self.author_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Librarian {
    pub id: LibrarianId,
    pub name: String,
    pub library_id: LibraryId,
}

/// Library detail projection: the library, its books and its librarian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDetail {
    pub library: Library,
    pub books: Vec<Book>,
    pub librarian: Option<Librarian>,
}

/// Write model for creating or editing a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author_id: AuthorId,
}

impl BookDraft {
    pub fn new(title: impl Into<String>, author_id: AuthorId) -> Self {
        Self {
            title: title.into(),
            author_id,
        }
    }

    /// Checks the title is non-blank and within its column limit.
    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        validate_text("title", &self.title, BOOK_TITLE_MAX_CHARS)
    }
}

/// Field-level validation failure for catalog writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValidationError {
    Blank { field: &'static str },
    TooLong { field: &'static str, max_chars: usize },
}

impl CatalogValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Blank { field } | Self::TooLong { field, .. } => field,
        }
    }
}

impl Display for CatalogValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank { field } => write!(f, "{field} must not be blank"),
            Self::TooLong { field, max_chars } => {
                write!(f, "{field} must be at most {max_chars} characters")
            }
        }
    }
}

impl Error for CatalogValidationError {}

pub fn validate_author_name(name: &str) -> Result<(), CatalogValidationError> {
    validate_text("name", name, AUTHOR_NAME_MAX_CHARS)
}

pub fn validate_library_name(name: &str) -> Result<(), CatalogValidationError> {
    validate_text("name", name, LIBRARY_NAME_MAX_CHARS)
}

pub fn validate_librarian_name(name: &str) -> Result<(), CatalogValidationError> {
    validate_text("name", name, LIBRARIAN_NAME_MAX_CHARS)
}

fn validate_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), CatalogValidationError> {
    if value.trim().is_empty() {
        return Err(CatalogValidationError::Blank { field });
    }
    if value.chars().count() > max_chars {
        return Err(CatalogValidationError::TooLong { field, max_chars });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_draft_rejects_blank_title() {
        let err = BookDraft::new("   ", 1).validate().unwrap_err();
        assert_eq!(err, CatalogValidationError::Blank { field: "title" });
        assert_eq!(err.field(), "title");
    }

    #[test]
    fn book_draft_enforces_title_limit_in_chars() {
        let at_limit = "é".repeat(BOOK_TITLE_MAX_CHARS);
        assert!(BookDraft::new(at_limit, 1).validate().is_ok());

        let over_limit = "x".repeat(BOOK_TITLE_MAX_CHARS + 1);
        let err = BookDraft::new(over_limit, 1).validate().unwrap_err();
        assert_eq!(
            err,
            CatalogValidationError::TooLong {
                field: "title",
                max_chars: BOOK_TITLE_MAX_CHARS
            }
        );
    }

    #[test]
    fn book_displays_title_and_author() {
        let book = Book {
            id: 7,
            title: "Dune".to_string(),
            author_id: 1,
            author_name: "Frank Herbert".to_string(),
        };
        assert_eq!(book.to_string(), "Dune by Frank Herbert");
    }

    #[test]
    fn name_validators_use_their_own_limits() {
        assert!(validate_author_name(&"a".repeat(100)).is_ok());
        assert!(validate_author_name(&"a".repeat(101)).is_err());
        assert!(validate_library_name(&"a".repeat(150)).is_ok());
        assert!(validate_librarian_name("").is_err());
    }
}
