//! Catalog use-case service.
//!
//! # Responsibility
//! - Gate every catalog use-case on the caller's book permissions.
//! - Bind raw form input into validated drafts with per-field errors.
//! - Delegate persistence to `CatalogRepository`.
//!
//! # Invariants
//! - Authorization is checked before any lookup, so a denied caller cannot
//!   learn which ids exist.
//! - A missing author on create/edit is a form error on `author_id`.
//! - Only `delete_book` removes rows; `delete_book_confirmation` is read-only.

use crate::auth::permission::BookPermission;
use crate::auth::policy::{AuthzError, Principal};
use crate::model::catalog::{
    Author, Book, BookDraft, BookId, CatalogValidationError, Librarian, LibraryDetail, LibraryId,
};
use crate::repo::catalog_repo::{BookListQuery, CatalogRepository, RepoError};
use crate::service::form::{BookForm, BookSearchForm, FormErrors};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CatalogServiceError {
    Forbidden(AuthzError),
    NotFound { entity: &'static str, id: i64 },
    Invalid(FormErrors),
    Repo(RepoError),
}

impl Display for CatalogServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Invalid(errors) => write!(f, "invalid form: {errors}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CatalogServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Forbidden(err) => Some(err),
            Self::Invalid(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound { .. } => None,
        }
    }
}

impl From<AuthzError> for CatalogServiceError {
    fn from(value: AuthzError) -> Self {
        Self::Forbidden(value)
    }
}

impl From<FormErrors> for CatalogServiceError {
    fn from(value: FormErrors) -> Self {
        Self::Invalid(value)
    }
}

impl From<RepoError> for CatalogServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound {
                entity: "author", ..
            } => Self::Invalid(FormErrors::single(
                "author_id",
                "select a valid choice; that author does not exist",
            )),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Invalid(validation_to_form_errors(&err)),
            other => Self::Repo(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogServiceError>;

/// Context for the edit form: the book being edited and author choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBookContext {
    pub book: Book,
    pub authors: Vec<Author>,
}

/// Catalog service facade over repository implementations.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists books, optionally filtered by the search form. Needs `can_view`.
    pub fn list_books(
        &self,
        principal: &Principal,
        search: &BookSearchForm,
    ) -> CatalogResult<Vec<Book>> {
        authorize_book_access(principal, BookPermission::View)?;
        let query = BookListQuery {
            search: search.cleaned()?,
        };
        Ok(self.repo.list_books(&query)?)
    }

    /// Library with its books and librarian. Needs `can_view`.
    pub fn library_detail(
        &self,
        principal: &Principal,
        id: LibraryId,
    ) -> CatalogResult<LibraryDetail> {
        authorize_book_access(principal, BookPermission::View)?;
        self.repo
            .get_library_detail(id)?
            .ok_or(CatalogServiceError::NotFound {
                entity: "library",
                id,
            })
    }

    /// Author choices for the add form. Needs `can_create`.
    pub fn add_book_form(&self, principal: &Principal) -> CatalogResult<Vec<Author>> {
        authorize_book_access(principal, BookPermission::Create)?;
        Ok(self.repo.list_authors()?)
    }

    /// Validates and creates a book. Needs `can_create`.
    pub fn add_book(&self, principal: &Principal, form: &BookForm) -> CatalogResult<BookId> {
        authorize_book_access(principal, BookPermission::Create)?;
        let draft = bind_book_form(form)?;
        let id = self.repo.create_book(&draft)?;
        info!(
            "event=book_created module=catalog status=ok book_id={id} author_id={}",
            draft.author_id
        );
        Ok(id)
    }

    /// Book and author choices for the edit form. Needs `can_edit`.
    pub fn edit_book_form(
        &self,
        principal: &Principal,
        id: BookId,
    ) -> CatalogResult<EditBookContext> {
        authorize_book_access(principal, BookPermission::Edit)?;
        let book = self.require_book(id)?;
        let authors = self.repo.list_authors()?;
        Ok(EditBookContext { book, authors })
    }

    /// Validates and updates a book. Needs `can_edit`.
    pub fn edit_book(
        &self,
        principal: &Principal,
        id: BookId,
        form: &BookForm,
    ) -> CatalogResult<()> {
        authorize_book_access(principal, BookPermission::Edit)?;
        self.require_book(id)?;
        let draft = bind_book_form(form)?;
        self.repo.update_book(id, &draft)?;
        info!("event=book_updated module=catalog status=ok book_id={id}");
        Ok(())
    }

    /// Book shown on the delete confirmation page. Needs `can_delete`.
    pub fn delete_book_confirmation(
        &self,
        principal: &Principal,
        id: BookId,
    ) -> CatalogResult<Book> {
        authorize_book_access(principal, BookPermission::Delete)?;
        self.require_book(id)
    }

    /// Deletes a book. Needs `can_delete`.
    pub fn delete_book(&self, principal: &Principal, id: BookId) -> CatalogResult<()> {
        authorize_book_access(principal, BookPermission::Delete)?;
        self.require_book(id)?;
        self.repo.delete_book(id)?;
        info!("event=book_deleted module=catalog status=ok book_id={id}");
        Ok(())
    }

    /// Books written by the named author; empty when the author is unknown.
    pub fn books_by_author(&self, author_name: &str) -> CatalogResult<Vec<Book>> {
        Ok(self.repo.books_by_author(author_name)?)
    }

    /// Books held by the named library; empty when the library is unknown.
    pub fn books_in_library(&self, library_name: &str) -> CatalogResult<Vec<Book>> {
        Ok(self.repo.books_in_library(library_name)?)
    }

    /// Librarian of the named library, if both exist.
    pub fn librarian_for_library(&self, library_name: &str) -> CatalogResult<Option<Librarian>> {
        Ok(self.repo.librarian_for_library(library_name)?)
    }

    fn require_book(&self, id: BookId) -> CatalogResult<Book> {
        self.repo
            .get_book(id)?
            .ok_or(CatalogServiceError::NotFound { entity: "book", id })
    }
}

/// Binds raw input into a draft. Author existence is checked by the
/// repository on write.
fn bind_book_form(form: &BookForm) -> CatalogResult<BookDraft> {
    let mut errors = FormErrors::new();

    let title = form.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        errors.add("title", "this field is required");
    }

    let author_id = match form.author_id.as_deref().map(str::trim) {
        None | Some("") => {
            errors.add("author_id", "this field is required");
            None
        }
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("author_id", "select a valid choice");
                None
            }
        },
    };

    let draft = match author_id {
        Some(author_id) if errors.is_empty() => BookDraft::new(title, author_id),
        _ => return Err(errors.into()),
    };

    if let Err(err) = draft.validate() {
        return Err(validation_to_form_errors(&err).into());
    }
    Ok(draft)
}

/// Checks one book permission and logs a denial. HTTP adapters call it
/// before touching request input, so malformed input never outranks a 403.
pub fn authorize_book_access(
    principal: &Principal,
    permission: BookPermission,
) -> Result<(), AuthzError> {
    principal.require_permission(permission).inspect_err(|_| {
        warn!(
            "event=authz_denied module=catalog status=denied permission={permission} user={}",
            principal
                .user()
                .map_or("anonymous", |user| user.username.as_str())
        );
    })
}

fn validation_to_form_errors(err: &CatalogValidationError) -> FormErrors {
    FormErrors::single(err.field(), err.to_string())
}
