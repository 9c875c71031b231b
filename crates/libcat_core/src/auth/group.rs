//! Default permission groups and their provisioning.
//!
//! # Invariants
//! - Permission sets are cumulative: Viewers ⊂ Editors ⊂ Admins.
//! - Provisioning uses insert-if-missing semantics; running it again never
//!   changes group, permission or link counts.

use crate::auth::permission::{BookPermission, BOOK_APP_LABEL};
use crate::db::DbResult;
use log::info;
use rusqlite::{params, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultGroup {
    Viewers,
    Editors,
    Admins,
}

impl DefaultGroup {
    pub const ALL: [DefaultGroup; 3] = [Self::Viewers, Self::Editors, Self::Admins];

    pub fn name(self) -> &'static str {
        match self {
            Self::Viewers => "Viewers",
            Self::Editors => "Editors",
            Self::Admins => "Admins",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.name() == name)
    }

    pub fn permissions(self) -> &'static [BookPermission] {
        match self {
            Self::Viewers => &[BookPermission::View],
            Self::Editors => &[
                BookPermission::View,
                BookPermission::Create,
                BookPermission::Edit,
            ],
            Self::Admins => &BookPermission::ALL,
        }
    }
}

/// Creates book permissions and the default groups if missing, then links
/// each group to its permission set.
pub fn provision_default_groups(conn: &Connection) -> DbResult<()> {
    for permission in BookPermission::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO permissions (app_label, codename, name)
             VALUES (?1, ?2, ?3);",
            params![BOOK_APP_LABEL, permission.codename(), permission.name()],
        )?;
    }

    for group in DefaultGroup::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO auth_groups (name) VALUES (?1);",
            [group.name()],
        )?;
        for permission in group.permissions() {
            conn.execute(
                "INSERT OR IGNORE INTO group_permissions (group_id, permission_id)
                 SELECT g.id, p.id
                 FROM auth_groups g, permissions p
                 WHERE g.name = ?1 AND p.app_label = ?2 AND p.codename = ?3;",
                params![group.name(), BOOK_APP_LABEL, permission.codename()],
            )?;
        }
    }

    info!("event=groups_provisioned module=auth status=ok groups=3 permissions=4");
    Ok(())
}

/// Deletes the default groups. Permissions themselves are kept.
pub fn remove_default_groups(conn: &Connection) -> DbResult<usize> {
    let mut removed = 0;
    for group in DefaultGroup::ALL {
        removed += conn.execute("DELETE FROM auth_groups WHERE name = ?1;", [group.name()])?;
    }
    info!("event=groups_removed module=auth status=ok removed={removed}");
    Ok(removed)
}
