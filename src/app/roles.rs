use anyhow::{anyhow, Result};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::role::{PermissionSet, Role};
use crate::infra::db::Db;

/// Confirmation state and permissions of one user, loaded in a single query
/// for per-request authorization.
#[derive(Debug, Clone, Copy)]
pub struct AccessProfile {
    pub confirmed: bool,
    pub permissions: PermissionSet,
}

#[derive(Clone)]
pub struct RoleService {
    db: Db,
}

impl RoleService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn access_profile(&self, user_id: Uuid) -> Result<Option<AccessProfile>> {
        let row = sqlx::query(
            "SELECT u.confirmed, r.permissions \
             FROM users u \
             JOIN roles r ON r.id = u.role_id \
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| AccessProfile {
            confirmed: row.get("confirmed"),
            permissions: PermissionSet::from_bits(row.get("permissions")),
        }))
    }

    pub async fn default_role_with_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Role> {
        let row = sqlx::query(
            "SELECT id, name, is_default, permissions FROM roles WHERE is_default LIMIT 1",
        )
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref()
            .map(map_role)
            .ok_or_else(|| anyhow!("no default role configured"))
    }

    pub async fn role_by_name_with_tx(
        &self,
        name: &str,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Role> {
        let row = sqlx::query(
            "SELECT id, name, is_default, permissions FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref()
            .map(map_role)
            .ok_or_else(|| anyhow!("unknown role: {}", name))
    }
}

fn map_role(row: &sqlx::postgres::PgRow) -> Role {
    Role {
        id: row.get("id"),
        name: row.get("name"),
        is_default: row.get("is_default"),
        permissions: PermissionSet::from_bits(row.get("permissions")),
    }
}
