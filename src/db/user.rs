use chrono::Utc;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// A user account row. `id` stays internal to the database layer;
/// everything public-facing speaks in the `uuid`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub settings: String,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    email: String,
    password_hash: String,
    full_name: String,
    phone: String,
    is_active: i32,
    is_verified: i32,
    settings: String,
    created_at: String,
    last_login_at: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone: row.phone,
            is_active: row.is_active != 0,
            is_verified: row.is_verified != 0,
            settings: row.settings,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        }
    }
}

const USER_COLUMNS: &str = "id, uuid, email, password_hash, full_name, phone, \
                            is_active, is_verified, settings, created_at, last_login_at";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID.
    pub async fn create(
        &self,
        uuid: &str,
        email: &str,
        password_hash: &str,
        full_name: &str,
        phone: &str,
        settings: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO users (uuid, email, password_hash, full_name, phone, settings)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(phone)
        .bind(settings)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Create a user and assign it a role in one transaction, so a failed
    /// role assignment never leaves a half-created account. The new user
    /// is recorded as its own assigning actor.
    pub async fn create_with_role(
        &self,
        uuid: &str,
        email: &str,
        password_hash: &str,
        full_name: &str,
        phone: &str,
        settings: &str,
        role_code: &str,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO users (uuid, email, password_hash, full_name, phone, settings)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(phone)
        .bind(settings)
        .execute(&mut *tx)
        .await?;
        let user_id = result.last_insert_rowid();

        let role: Option<(i64,)> = sqlx::query_as("SELECT id FROM roles WHERE code = ?")
            .bind(role_code)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some((role_id,)) = role {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role_id, assigned_by) VALUES (?, ?, ?)",
            )
            .bind(user_id)
            .bind(role_id)
            .bind(uuid)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(user_id)
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = ?"))
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    /// Check whether any user (active or not) holds this email.
    pub async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Deactivate an account. The row is kept; only the flag flips.
    pub async fn set_active(&self, uuid: &str, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET is_active = ?, updated_at = datetime('now') WHERE uuid = ?",
        )
        .bind(active as i32)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a user's email as verified.
    pub async fn mark_verified(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET is_verified = 1, updated_at = datetime('now') WHERE uuid = ?",
        )
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update profile fields. `None` leaves a field unchanged.
    pub async fn update_profile(
        &self,
        uuid: &str,
        full_name: Option<&str>,
        phone: Option<&str>,
        settings: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET
                full_name = COALESCE(?, full_name),
                phone = COALESCE(?, phone),
                settings = COALESCE(?, settings),
                updated_at = datetime('now')
             WHERE uuid = ?",
        )
        .bind(full_name)
        .bind(phone)
        .bind(settings)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored password digest.
    pub async fn set_password_hash(&self, uuid: &str, hash: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE uuid = ?",
        )
        .bind(hash)
        .bind(uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a successful login.
    pub async fn touch_last_login(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List users, newest last.
    pub async fn list(&self, page: i64, page_size: i64) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id LIMIT ? OFFSET ?"
        ))
        .bind(page_size)
        .bind((page - 1).max(0) * page_size)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
