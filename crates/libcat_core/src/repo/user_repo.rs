//! Account repository: users, profiles, groups and permission grants.
//!
//! # Invariants
//! - `create_user` inserts the user and its `Member` profile in one
//!   transaction; a user row never exists without a profile.
//! - `save_user` re-saves the existing profile and never inserts a second one.
//! - Effective permissions are the union of direct and group grants.

use crate::auth::group::DefaultGroup;
use crate::auth::permission::{BookPermission, BOOK_APP_LABEL};
use crate::model::user::{NewUser, Role, User, UserId, UserProfile};
use crate::repo::catalog_repo::{RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::BTreeSet;

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    date_of_birth,
    profile_photo,
    is_active,
    is_staff,
    is_superuser
FROM users";

/// User row plus its stored password hash, for credential checks only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Repository interface for account persistence.
pub trait UserRepository {
    /// Inserts the user and its default profile atomically.
    fn create_user(&self, new_user: &NewUser, password_hash: &str) -> RepoResult<User>;
    /// Persists mutable user fields and re-saves the profile.
    fn save_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn find_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>>;
    fn username_taken(&self, username: &str) -> RepoResult<bool>;

    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>>;
    fn set_role(&self, user_id: UserId, role: Role) -> RepoResult<()>;

    fn add_to_group(&self, user_id: UserId, group: DefaultGroup) -> RepoResult<()>;
    fn grant_permission(&self, user_id: UserId, permission: BookPermission) -> RepoResult<()>;
    fn effective_permissions(&self, user_id: UserId) -> RepoResult<BTreeSet<BookPermission>>;
}

/// SQLite-backed account repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn ensure_user_exists(&self, user_id: UserId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
            [user_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user_id,
            });
        }
        Ok(())
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, new_user: &NewUser, password_hash: &str) -> RepoResult<User> {
        let tx = self.conn.unchecked_transaction()?;

        let inserted = tx.execute(
            "INSERT INTO users (
                username,
                email,
                date_of_birth,
                profile_photo,
                password_hash,
                is_staff,
                is_superuser
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                new_user.username.as_str(),
                new_user.email.as_str(),
                new_user.date_of_birth.as_deref(),
                new_user.profile_photo.as_deref(),
                password_hash,
                new_user.is_staff,
                new_user.is_superuser,
            ],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(RepoError::Conflict(format!(
                    "username `{}` is already taken",
                    new_user.username
                )));
            }
            return Err(err.into());
        }
        let user_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO user_profiles (user_id, role) VALUES (?1, ?2);",
            params![user_id, Role::default().as_str()],
        )?;
        tx.commit()?;

        info!("event=profile_created module=repo status=ok user_id={user_id}");

        self.get_user(user_id)?
            .ok_or_else(|| RepoError::InvalidData(format!("user {user_id} missing after insert")))
    }

    fn save_user(&self, user: &User) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE users
             SET
                email = ?1,
                date_of_birth = ?2,
                profile_photo = ?3,
                is_active = ?4,
                is_staff = ?5,
                is_superuser = ?6
             WHERE id = ?7;",
            params![
                user.email.as_str(),
                user.date_of_birth.as_deref(),
                user.profile_photo.as_deref(),
                user.is_active,
                user.is_staff,
                user.is_superuser,
                user.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id: user.id,
            });
        }

        tx.execute(
            "UPDATE user_profiles
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE user_id = ?1;",
            [user.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn find_credentials(&self, username: &str) -> RepoResult<Option<UserCredentials>> {
        let credentials = self
            .conn
            .query_row(
                "SELECT
                    id,
                    username,
                    email,
                    date_of_birth,
                    profile_photo,
                    is_active,
                    is_staff,
                    is_superuser,
                    password_hash
                 FROM users
                 WHERE username = ?1;",
                [username],
                |row| {
                    Ok(UserCredentials {
                        user: parse_user_row(row)?,
                        password_hash: row.get("password_hash")?,
                    })
                },
            )
            .optional()?;
        Ok(credentials)
    }

    fn username_taken(&self, username: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1);",
            [username],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>> {
        let role_text: Option<String> = self
            .conn
            .query_row(
                "SELECT role FROM user_profiles WHERE user_id = ?1;",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;

        role_text
            .map(|value| {
                Role::parse(&value)
                    .map(|role| UserProfile { user_id, role })
                    .ok_or_else(|| {
                        RepoError::InvalidData(format!(
                            "invalid role `{value}` in user_profiles.role"
                        ))
                    })
            })
            .transpose()
    }

    fn set_role(&self, user_id: UserId, role: Role) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE user_profiles
             SET role = ?1, updated_at = (strftime('%s', 'now') * 1000)
             WHERE user_id = ?2;",
            params![role.as_str(), user_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "profile",
                id: user_id,
            });
        }
        Ok(())
    }

    fn add_to_group(&self, user_id: UserId, group: DefaultGroup) -> RepoResult<()> {
        self.ensure_user_exists(user_id)?;
        let group_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM auth_groups WHERE name = ?1;",
                [group.name()],
                |row| row.get(0),
            )
            .optional()?;
        let group_id = group_id.ok_or_else(|| {
            RepoError::InvalidData(format!("group `{}` has not been provisioned", group.name()))
        })?;

        self.conn.execute(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2);",
            params![user_id, group_id],
        )?;
        Ok(())
    }

    fn grant_permission(&self, user_id: UserId, permission: BookPermission) -> RepoResult<()> {
        self.ensure_user_exists(user_id)?;
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO user_permissions (user_id, permission_id)
             SELECT ?1, id FROM permissions WHERE app_label = ?2 AND codename = ?3;",
            params![user_id, BOOK_APP_LABEL, permission.codename()],
        )?;
        if changed == 0 {
            let granted: i64 = self.conn.query_row(
                "SELECT COUNT(*)
                 FROM user_permissions up
                 JOIN permissions p ON p.id = up.permission_id
                 WHERE up.user_id = ?1 AND p.app_label = ?2 AND p.codename = ?3;",
                params![user_id, BOOK_APP_LABEL, permission.codename()],
                |row| row.get(0),
            )?;
            if granted == 0 {
                return Err(RepoError::InvalidData(format!(
                    "permission `{permission}` has not been provisioned"
                )));
            }
        }
        Ok(())
    }

    fn effective_permissions(&self, user_id: UserId) -> RepoResult<BTreeSet<BookPermission>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.codename
             FROM permissions p
             JOIN user_permissions up ON up.permission_id = p.id
             WHERE up.user_id = ?1 AND p.app_label = ?2
             UNION
             SELECT p.codename
             FROM permissions p
             JOIN group_permissions gp ON gp.permission_id = p.id
             JOIN user_groups ug ON ug.group_id = gp.group_id
             WHERE ug.user_id = ?1 AND p.app_label = ?2;",
        )?;
        let codenames = stmt
            .query_map(params![user_id, BOOK_APP_LABEL], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        // Unknown codenames under our app label are ignored rather than
        // failing authorization for the whole request.
        Ok(codenames
            .iter()
            .filter_map(|codename| BookPermission::from_codename(codename))
            .collect())
    }
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        date_of_birth: row.get("date_of_birth")?,
        profile_photo: row.get("profile_photo")?,
        is_active: row.get("is_active")?,
        is_staff: row.get("is_staff")?,
        is_superuser: row.get("is_superuser")?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}
