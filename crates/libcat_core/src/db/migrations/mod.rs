//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema and data migrations in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Data migrations are written with get-or-create semantics so a repeated
//!   run does not change row counts.

use crate::auth::group::provision_default_groups;
use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Clone, Copy)]
enum MigrationStep {
    Sql(&'static str),
    Data(fn(&Connection) -> DbResult<()>),
}

#[derive(Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    step: MigrationStep,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "catalog",
        step: MigrationStep::Sql(include_str!("0001_init.sql")),
    },
    Migration {
        version: 2,
        name: "accounts",
        step: MigrationStep::Sql(include_str!("0002_accounts.sql")),
    },
    Migration {
        version: 3,
        name: "create_groups",
        step: MigrationStep::Data(provision_default_groups),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        run_step(&tx, migration).map_err(|source| DbError::MigrationFailed {
            version: migration.version,
            name: migration.name,
            source: Box::new(source),
        })?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=migration_applied module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

fn run_step(conn: &Connection, migration: &Migration) -> DbResult<()> {
    match migration.step {
        MigrationStep::Sql(sql) => conn.execute_batch(sql)?,
        MigrationStep::Data(apply) => apply(conn)?,
    }
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
