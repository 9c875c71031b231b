//! Server-side login sessions keyed by opaque tokens.

use crate::model::user::UserId;
use crate::repo::catalog_repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

pub trait SessionRepository {
    /// Creates a session for `user_id` and returns its token.
    fn create_session(&self, user_id: UserId) -> RepoResult<String>;
    fn user_for_session(&self, token: &str) -> RepoResult<Option<UserId>>;
    /// Returns whether a session was removed.
    fn delete_session(&self, token: &str) -> RepoResult<bool>;
}

pub struct SqliteSessionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSessionRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SessionRepository for SqliteSessionRepository<'_> {
    fn create_session(&self, user_id: UserId) -> RepoResult<String> {
        let token = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO sessions (token, user_id) VALUES (?1, ?2);",
            params![token.as_str(), user_id],
        )?;
        Ok(token)
    }

    fn user_for_session(&self, token: &str) -> RepoResult<Option<UserId>> {
        let user_id = self
            .conn
            .query_row(
                "SELECT user_id FROM sessions WHERE token = ?1;",
                [token],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user_id)
    }

    fn delete_session(&self, token: &str) -> RepoResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [token])?;
        Ok(removed > 0)
    }
}
