mod operation;
mod role;
mod token;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

pub use operation::{Operation, OperationFilter, OperationKind, OperationStore, PaymentMethod};
pub use role::{Role, RoleStore, WILDCARD_PERMISSION};
pub use token::{RefreshTokenRecord, RefreshTokenStore};
pub use user::{User, UserStore};

/// System roles seeded at bootstrap: (code, name, description, permissions).
/// These are immutable and non-deletable through the role API.
const SYSTEM_ROLES: &[(&str, &str, &str, &[&str])] = &[
    ("SUPER_ADMIN", "Super administrator", "Full access to the entire system", &["*"]),
    (
        "ADMIN",
        "Administrator",
        "User and settings management",
        &["users.manage", "settings.manage", "roles.manage"],
    ),
    (
        "MANAGER",
        "Manager",
        "Reports and analytics access",
        &["reports.view", "analytics.view", "operations.view"],
    ),
    (
        "USER",
        "User",
        "Operations on own data",
        &["operations.own.manage", "tags.own.manage"],
    ),
];

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let (url, max_connections) = if path == ":memory:" {
            // An in-memory database is private to its connection, so the
            // pool must never grow past one.
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{}?mode=rwc", path), 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        db.seed_system_roles().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Users table
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    full_name TEXT NOT NULL DEFAULT '',
                    phone TEXT NOT NULL DEFAULT '',
                    is_active INTEGER NOT NULL DEFAULT 1,
                    is_verified INTEGER NOT NULL DEFAULT 0,
                    settings TEXT NOT NULL DEFAULT '{}',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    last_login_at TEXT
                )",
                "CREATE INDEX idx_users_uuid ON users(uuid)",
                "CREATE INDEX idx_users_email ON users(email)",
                // Roles table; permissions is a JSON array of strings
                "CREATE TABLE roles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    code TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    permissions TEXT NOT NULL DEFAULT '[]',
                    is_system INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_roles_code ON roles(code)",
                // User-role assignments
                "CREATE TABLE user_roles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
                    assigned_by TEXT,
                    assigned_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(user_id, role_id)
                )",
                "CREATE INDEX idx_user_roles_user_id ON user_roles(user_id)",
                "CREATE INDEX idx_user_roles_role_id ON user_roles(role_id)",
                // Refresh tokens; revocation sets revoked_at, rows are kept
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    token TEXT UNIQUE NOT NULL,
                    expires_at TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    revoked_at TEXT
                )",
                "CREATE INDEX idx_refresh_tokens_token ON refresh_tokens(token)",
                "CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id)",
                "CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at)",
                // Financial operations; amounts in minor units
                "CREATE TABLE operations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    kind TEXT NOT NULL,
                    amount_minor INTEGER NOT NULL,
                    currency TEXT NOT NULL,
                    payment_method TEXT NOT NULL DEFAULT 'card',
                    description TEXT NOT NULL DEFAULT '',
                    notes TEXT NOT NULL DEFAULT '',
                    occurred_at TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    deleted_at TEXT
                )",
                "CREATE INDEX idx_operations_uuid ON operations(uuid)",
                "CREATE INDEX idx_operations_owner_id ON operations(owner_id)",
                "CREATE INDEX idx_operations_occurred_at ON operations(occurred_at)",
            ],
        )
        .await
    }

    /// Insert the built-in system roles if they are absent.
    /// Idempotent: safe to run on every startup.
    async fn seed_system_roles(&self) -> Result<(), sqlx::Error> {
        for (code, name, description, permissions) in SYSTEM_ROLES {
            let permissions_json = serde_json::to_string(permissions)
                .expect("static permission list serializes");
            sqlx::query(
                "INSERT INTO roles (uuid, code, name, description, permissions, is_system)
                 SELECT ?, ?, ?, ?, ?, 1
                 WHERE NOT EXISTS (SELECT 1 FROM roles WHERE code = ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(code)
            .bind(name)
            .bind(description)
            .bind(&permissions_json)
            .bind(code)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the role store.
    pub fn roles(&self) -> RoleStore {
        RoleStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the financial operation store.
    pub fn operations(&self) -> OperationStore {
        OperationStore::new(self.pool.clone())
    }

}
