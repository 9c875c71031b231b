//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `authors`, `books`, `libraries`, `librarians`.
//! - Provide relationship queries (author → books, library → books,
//!   library → librarian).
//!
//! # Invariants
//! - Write paths validate input before SQL mutations.
//! - Every statement binds user input as parameters; no SQL is built from
//!   request values.
//! - A book write referencing a missing author fails with `NotFound` for the
//!   author, never with a constraint violation.

use crate::db::DbError;
use crate::model::catalog::{
    validate_author_name, validate_librarian_name, validate_library_name, Author, AuthorId, Book,
    BookDraft, BookId, CatalogValidationError, Librarian, LibrarianId, Library, LibraryDetail,
    LibraryId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const BOOK_SELECT_SQL: &str = "SELECT
    b.id,
    b.title,
    b.author_id,
    a.name AS author_name
FROM books b
JOIN authors a ON a.id = b.author_id";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by catalog and account persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(CatalogValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: i64 },
    Conflict(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } | Self::Conflict(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<CatalogValidationError> for RepoError {
    fn from(value: CatalogValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing books.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookListQuery {
    /// Substring matched against title or author name with SQLite `LIKE`.
    /// Case folding covers ASCII letters only: `dune` finds `Dune`, but
    /// `ébène` does not find `Ébène`.
    pub search: Option<String>,
}

/// Repository interface for catalog operations.
pub trait CatalogRepository {
    fn create_author(&self, name: &str) -> RepoResult<AuthorId>;
    fn get_author(&self, id: AuthorId) -> RepoResult<Option<Author>>;
    fn list_authors(&self) -> RepoResult<Vec<Author>>;

    fn create_book(&self, draft: &BookDraft) -> RepoResult<BookId>;
    fn update_book(&self, id: BookId, draft: &BookDraft) -> RepoResult<()>;
    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>>;
    fn list_books(&self, query: &BookListQuery) -> RepoResult<Vec<Book>>;
    fn delete_book(&self, id: BookId) -> RepoResult<()>;

    fn create_library(&self, name: &str) -> RepoResult<LibraryId>;
    fn add_book_to_library(&self, library_id: LibraryId, book_id: BookId) -> RepoResult<()>;
    fn get_library_detail(&self, id: LibraryId) -> RepoResult<Option<LibraryDetail>>;
    fn assign_librarian(&self, library_id: LibraryId, name: &str) -> RepoResult<LibrarianId>;

    fn books_by_author(&self, author_name: &str) -> RepoResult<Vec<Book>>;
    fn books_in_library(&self, library_name: &str) -> RepoResult<Vec<Book>>;
    fn librarian_for_library(&self, library_name: &str) -> RepoResult<Option<Librarian>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn author_exists(&self, id: AuthorId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM authors WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn query_books(&self, sql: &str, params: impl rusqlite::Params) -> RepoResult<Vec<Book>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut books = Vec::new();
        while let Some(row) = rows.next()? {
            books.push(parse_book_row(row)?);
        }
        Ok(books)
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn create_author(&self, name: &str) -> RepoResult<AuthorId> {
        validate_author_name(name)?;
        self.conn
            .execute("INSERT INTO authors (name) VALUES (?1);", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_author(&self, id: AuthorId) -> RepoResult<Option<Author>> {
        let author = self
            .conn
            .query_row(
                "SELECT id, name FROM authors WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Author {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;
        Ok(author)
    }

    fn list_authors(&self) -> RepoResult<Vec<Author>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM authors ORDER BY name ASC, id ASC;")?;
        let authors = stmt
            .query_map([], |row| {
                Ok(Author {
                    id: row.get("id")?,
                    name: row.get("name")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authors)
    }

    fn create_book(&self, draft: &BookDraft) -> RepoResult<BookId> {
        draft.validate()?;
        if !self.author_exists(draft.author_id)? {
            return Err(RepoError::NotFound {
                entity: "author",
                id: draft.author_id,
            });
        }

        self.conn.execute(
            "INSERT INTO books (title, author_id) VALUES (?1, ?2);",
            params![draft.title.trim(), draft.author_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_book(&self, id: BookId, draft: &BookDraft) -> RepoResult<()> {
        draft.validate()?;
        if !self.author_exists(draft.author_id)? {
            return Err(RepoError::NotFound {
                entity: "author",
                id: draft.author_id,
            });
        }

        let changed = self.conn.execute(
            "UPDATE books SET title = ?1, author_id = ?2 WHERE id = ?3;",
            params![draft.title.trim(), draft.author_id, id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "book", id });
        }
        Ok(())
    }

    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>> {
        let mut books = self.query_books(&format!("{BOOK_SELECT_SQL} WHERE b.id = ?1;"), [id])?;
        Ok(books.pop())
    }

    fn list_books(&self, query: &BookListQuery) -> RepoResult<Vec<Book>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match search {
            Some(term) => self.query_books(
                &format!(
                    "{BOOK_SELECT_SQL}
                     WHERE b.title LIKE ?1 ESCAPE '\\' OR a.name LIKE ?1 ESCAPE '\\'
                     ORDER BY b.title ASC, b.id ASC;"
                ),
                [like_contains_pattern(term)],
            ),
            None => self.query_books(
                &format!("{BOOK_SELECT_SQL} ORDER BY b.title ASC, b.id ASC;"),
                [],
            ),
        }
    }

    fn delete_book(&self, id: BookId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM books WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "book", id });
        }
        Ok(())
    }

    fn create_library(&self, name: &str) -> RepoResult<LibraryId> {
        validate_library_name(name)?;
        self.conn
            .execute("INSERT INTO libraries (name) VALUES (?1);", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_book_to_library(&self, library_id: LibraryId, book_id: BookId) -> RepoResult<()> {
        let library_exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM libraries WHERE id = ?1);",
            [library_id],
            |row| row.get(0),
        )?;
        if library_exists == 0 {
            return Err(RepoError::NotFound {
                entity: "library",
                id: library_id,
            });
        }
        if self.get_book(book_id)?.is_none() {
            return Err(RepoError::NotFound {
                entity: "book",
                id: book_id,
            });
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO library_books (library_id, book_id) VALUES (?1, ?2);",
            params![library_id, book_id],
        )?;
        Ok(())
    }

    fn get_library_detail(&self, id: LibraryId) -> RepoResult<Option<LibraryDetail>> {
        let library = self
            .conn
            .query_row(
                "SELECT id, name FROM libraries WHERE id = ?1;",
                [id],
                |row| {
                    Ok(Library {
                        id: row.get("id")?,
                        name: row.get("name")?,
                    })
                },
            )
            .optional()?;

        let Some(library) = library else {
            return Ok(None);
        };

        let books = self.query_books(
            &format!(
                "{BOOK_SELECT_SQL}
                 JOIN library_books lb ON lb.book_id = b.id
                 WHERE lb.library_id = ?1
                 ORDER BY b.title ASC, b.id ASC;"
            ),
            [id],
        )?;

        let librarian = self
            .conn
            .query_row(
                "SELECT id, name, library_id FROM librarians WHERE library_id = ?1;",
                [id],
                parse_librarian_row,
            )
            .optional()?;

        Ok(Some(LibraryDetail {
            library,
            books,
            librarian,
        }))
    }

    fn assign_librarian(&self, library_id: LibraryId, name: &str) -> RepoResult<LibrarianId> {
        validate_librarian_name(name)?;

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM librarians WHERE library_id = ?1;",
                [library_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(RepoError::Conflict(format!(
                "library {library_id} already has a librarian"
            )));
        }

        let library_exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM libraries WHERE id = ?1);",
            [library_id],
            |row| row.get(0),
        )?;
        if library_exists == 0 {
            return Err(RepoError::NotFound {
                entity: "library",
                id: library_id,
            });
        }

        self.conn.execute(
            "INSERT INTO librarians (name, library_id) VALUES (?1, ?2);",
            params![name, library_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn books_by_author(&self, author_name: &str) -> RepoResult<Vec<Book>> {
        self.query_books(
            &format!("{BOOK_SELECT_SQL} WHERE a.name = ?1 ORDER BY b.title ASC, b.id ASC;"),
            [author_name],
        )
    }

    fn books_in_library(&self, library_name: &str) -> RepoResult<Vec<Book>> {
        self.query_books(
            &format!(
                "{BOOK_SELECT_SQL}
                 JOIN library_books lb ON lb.book_id = b.id
                 JOIN libraries l ON l.id = lb.library_id
                 WHERE l.name = ?1
                 ORDER BY b.title ASC, b.id ASC;"
            ),
            [library_name],
        )
    }

    fn librarian_for_library(&self, library_name: &str) -> RepoResult<Option<Librarian>> {
        let librarian = self
            .conn
            .query_row(
                "SELECT lr.id, lr.name, lr.library_id
                 FROM librarians lr
                 JOIN libraries l ON l.id = lr.library_id
                 WHERE l.name = ?1
                 ORDER BY l.id ASC
                 LIMIT 1;",
                [library_name],
                parse_librarian_row,
            )
            .optional()?;
        Ok(librarian)
    }
}

fn parse_book_row(row: &Row<'_>) -> RepoResult<Book> {
    let title: String = row.get("title")?;
    if title.trim().is_empty() {
        return Err(RepoError::InvalidData(
            "blank title in books.title".to_string(),
        ));
    }
    Ok(Book {
        id: row.get("id")?,
        title,
        author_id: row.get("author_id")?,
        author_name: row.get("author_name")?,
    })
}

fn parse_librarian_row(row: &Row<'_>) -> rusqlite::Result<Librarian> {
    Ok(Librarian {
        id: row.get("id")?,
        name: row.get("name")?,
        library_id: row.get("library_id")?,
    })
}

/// Wraps `term` in `%` after escaping LIKE wildcards, so `%` and `_` in user
/// input match literally.
fn like_contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_contains_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_contains_pattern("dune"), "%dune%");
        assert_eq!(like_contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
