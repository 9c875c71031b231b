//! Book and library views. Every handler is gated by a book permission;
//! denials surface as 403.
//!
//! Path, query and form extractors are taken as `Result`s and only unwrapped
//! after the permission check, so a caller without the permission gets 403
//! for a malformed request too.

use crate::error::AppResult;
use crate::handlers::BOOKS_PATH;
use crate::AppState;
use axum::extract::rejection::{FormRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum::{Extension, Form, Json};
use libcat_core::{
    authorize_book_access, Author, Book, BookForm, BookPermission, BookSearchForm, LibraryDetail,
    Principal,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BookListResponse {
    pub books: Vec<Book>,
    pub q: Option<String>,
}

/// Context for the add/edit form. `book` is set when editing.
#[derive(Debug, Serialize)]
pub struct BookFormContext {
    pub book: Option<Book>,
    pub authors: Vec<Author>,
}

#[derive(Debug, Serialize)]
pub struct DeleteConfirmation {
    pub book: Book,
}

pub async fn list_books(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    search: Result<Query<BookSearchForm>, QueryRejection>,
) -> AppResult<Json<BookListResponse>> {
    authorize_book_access(&principal, BookPermission::View)?;
    let Query(search) = search?;
    let books = state.catalog(|catalog| catalog.list_books(&principal, &search))?;
    Ok(Json(BookListResponse {
        books,
        q: search.q,
    }))
}

pub async fn library_detail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<LibraryDetail>> {
    authorize_book_access(&principal, BookPermission::View)?;
    let Path(id) = id?;
    let detail = state.catalog(|catalog| catalog.library_detail(&principal, id))?;
    Ok(Json(detail))
}

pub async fn add_book_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<BookFormContext>> {
    let authors = state.catalog(|catalog| catalog.add_book_form(&principal))?;
    Ok(Json(BookFormContext {
        book: None,
        authors,
    }))
}

pub async fn add_book(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    form: Result<Form<BookForm>, FormRejection>,
) -> AppResult<Redirect> {
    authorize_book_access(&principal, BookPermission::Create)?;
    let Form(form) = form?;
    state.catalog(|catalog| catalog.add_book(&principal, &form))?;
    Ok(Redirect::to(BOOKS_PATH))
}

pub async fn edit_book_form(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<BookFormContext>> {
    authorize_book_access(&principal, BookPermission::Edit)?;
    let Path(id) = id?;
    let context = state.catalog(|catalog| catalog.edit_book_form(&principal, id))?;
    Ok(Json(BookFormContext {
        book: Some(context.book),
        authors: context.authors,
    }))
}

pub async fn edit_book(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
    form: Result<Form<BookForm>, FormRejection>,
) -> AppResult<Redirect> {
    authorize_book_access(&principal, BookPermission::Edit)?;
    let Path(id) = id?;
    let Form(form) = form?;
    state.catalog(|catalog| catalog.edit_book(&principal, id, &form))?;
    Ok(Redirect::to(BOOKS_PATH))
}

/// Shows what would be deleted. Never deletes.
pub async fn delete_book_confirmation(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<DeleteConfirmation>> {
    authorize_book_access(&principal, BookPermission::Delete)?;
    let Path(id) = id?;
    let book = state.catalog(|catalog| catalog.delete_book_confirmation(&principal, id))?;
    Ok(Json(DeleteConfirmation { book }))
}

pub async fn delete_book(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Redirect> {
    authorize_book_access(&principal, BookPermission::Delete)?;
    let Path(id) = id?;
    state.catalog(|catalog| catalog.delete_book(&principal, id))?;
    Ok(Redirect::to(BOOKS_PATH))
}
