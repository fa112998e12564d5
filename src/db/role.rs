//! Role storage and permission resolution.
//!
//! A role is a named bundle of permission strings. The sentinel
//! permission `*` grants everything. Role-to-user assignment lives in
//! the `user_roles` join table; resolution answers are always computed
//! from the current assignments, never cached.

use std::collections::BTreeSet;

use sqlx::sqlite::SqlitePool;

/// Permission wildcard granting every capability.
pub const WILDCARD_PERMISSION: &str = "*";

#[derive(Clone)]
pub struct RoleStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct Role {
    pub id: i64,
    pub uuid: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
    pub is_system: bool,
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    uuid: String,
    code: String,
    name: String,
    description: String,
    permissions: String,
    is_system: i32,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            code: row.code,
            name: row.name,
            description: row.description,
            // Stored as a JSON array; an unreadable value degrades to
            // "no permissions" rather than poisoning every lookup.
            permissions: serde_json::from_str(&row.permissions).unwrap_or_default(),
            is_system: row.is_system != 0,
        }
    }
}

const ROLE_COLUMNS: &str = "id, uuid, code, name, description, permissions, is_system";

impl RoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a role by its code (e.g. "ADMIN").
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Role>, sqlx::Error> {
        let row: Option<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE code = ?"))
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Role::from))
    }

    /// Get a role by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Role>, sqlx::Error> {
        let row: Option<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE uuid = ?"))
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Role::from))
    }

    /// List all roles.
    pub async fn list(&self) -> Result<Vec<Role>, sqlx::Error> {
        let rows: Vec<RoleRow> =
            sqlx::query_as(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    /// Create a custom (non-system) role. The caller is expected to have
    /// checked for a code conflict; the UNIQUE constraint backstops races.
    pub async fn create(
        &self,
        uuid: &str,
        code: &str,
        name: &str,
        description: &str,
        permissions: &[String],
    ) -> Result<i64, sqlx::Error> {
        let permissions_json =
            serde_json::to_string(permissions).unwrap_or_else(|_| "[]".to_string());
        let result = sqlx::query(
            "INSERT INTO roles (uuid, code, name, description, permissions, is_system)
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(uuid)
        .bind(code)
        .bind(name)
        .bind(description)
        .bind(&permissions_json)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Update a role's mutable fields. `None` leaves a field unchanged.
    /// System-role protection is enforced by the caller, which must look
    /// the role up first; this guard is the database-level backstop.
    pub async fn update(
        &self,
        uuid: &str,
        name: Option<&str>,
        description: Option<&str>,
        permissions: Option<&[String]>,
    ) -> Result<bool, sqlx::Error> {
        let permissions_json = permissions
            .map(|p| serde_json::to_string(p).unwrap_or_else(|_| "[]".to_string()));
        let result = sqlx::query(
            "UPDATE roles SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                permissions = COALESCE(?, permissions),
                updated_at = datetime('now')
             WHERE uuid = ? AND is_system = 0",
        )
        .bind(name)
        .bind(description)
        .bind(permissions_json)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a non-system role. Returns false when the role is absent
    /// or system-protected.
    pub async fn delete(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM roles WHERE uuid = ? AND is_system = 0")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of users currently holding a role.
    pub async fn assignment_count(&self, role_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_roles WHERE role_id = ?")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// All roles assigned to a user.
    pub async fn roles_of(&self, user_id: i64) -> Result<Vec<Role>, sqlx::Error> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            "SELECT r.id, r.uuid, r.code, r.name, r.description, r.permissions, r.is_system
             FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = ?
             ORDER BY r.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    /// Union of permission strings across all of a user's roles.
    /// The wildcard appears in the set as itself.
    pub async fn permissions_of(&self, user_id: i64) -> Result<BTreeSet<String>, sqlx::Error> {
        let roles = self.roles_of(user_id).await?;
        Ok(roles
            .into_iter()
            .flat_map(|role| role.permissions)
            .collect())
    }

    /// Point permission check: wildcard or exact match.
    pub async fn has_permission(
        &self,
        user_id: i64,
        permission: &str,
    ) -> Result<bool, sqlx::Error> {
        let permissions = self.permissions_of(user_id).await?;
        Ok(permissions.contains(WILDCARD_PERMISSION) || permissions.contains(permission))
    }

    /// Assign a role to a user, recording the assigning actor.
    /// Returns false (no error) when the code is unknown or the pair
    /// already exists.
    pub async fn assign(
        &self,
        user_id: i64,
        role_code: &str,
        assigned_by: &str,
    ) -> Result<bool, sqlx::Error> {
        let role: Option<(i64,)> = sqlx::query_as("SELECT id FROM roles WHERE code = ?")
            .bind(role_code)
            .fetch_optional(&self.pool)
            .await?;
        let Some((role_id,)) = role else {
            return Ok(false);
        };

        let result = sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_by) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(role_id)
        .bind(assigned_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a role from a user. Returns false when the pair is absent.
    pub async fn remove(&self, user_id: i64, role_code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM user_roles
             WHERE user_id = ? AND role_id = (SELECT id FROM roles WHERE code = ?)",
        )
        .bind(user_id)
        .bind(role_code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
