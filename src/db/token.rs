//! Refresh token storage: expiry, revocation, and single-use rotation.
//!
//! Revocation sets `revoked_at` and never deletes the row, so a replayed
//! token is distinguishable from one that never existed. The conditional
//! revoke UPDATE (`WHERE revoked_at IS NULL`) is the atomicity primitive:
//! of two concurrent rotations of the same token, exactly one sees a row
//! transition.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// A stored refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: String,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    /// A token is valid iff it was never revoked and has not expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    user_id: i64,
    token: String,
    expires_at: DateTime<Utc>,
    created_at: String,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for RefreshTokenRecord {
    fn from(row: TokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token: row.token,
            expires_at: row.expires_at,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        }
    }
}

/// Store for refresh tokens.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a new refresh token. The UNIQUE constraint on the token
    /// string rejects a collision instead of overwriting; with 64 bytes
    /// of entropy the caller treats that as an infrastructure error.
    pub async fn create(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Look up a token by its exact string.
    pub async fn find(&self, token: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT id, user_id, token, expires_at, created_at, revoked_at
             FROM refresh_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RefreshTokenRecord::from))
    }

    /// Revoke a token. Returns true only when the row transitioned from
    /// live to revoked in this call; absent or already-revoked tokens
    /// return false. Idempotent.
    pub async fn revoke(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rotate a refresh token: revoke the old one and persist its
    /// replacement in a single transaction.
    ///
    /// Returns false when the old token was already revoked (a concurrent
    /// rotation won); nothing is written in that case. If persisting the
    /// replacement fails, the transaction rolls back and the old token
    /// stays live.
    pub async fn rotate(
        &self,
        old_token: &str,
        user_id: i64,
        new_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE token = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now())
        .bind(old_token)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO refresh_tokens (user_id, token, expires_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(new_token)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Delete rows whose expiry is older than the cutoff. Revoked rows
    /// inside the window are kept for replay diagnostics.
    pub async fn delete_expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Duration;

    async fn seed_user(db: &Database) -> i64 {
        db.users()
            .create("uuid-1", "alice@example.com", "hash", "Alice", "", "{}")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = seed_user(&db).await;
        let expires = Utc::now() + Duration::days(7);

        db.tokens().create(user_id, "tok-1", expires).await.unwrap();

        let record = db.tokens().find("tok-1").await.unwrap().unwrap();
        assert_eq!(record.user_id, user_id);
        assert!(record.revoked_at.is_none());
        assert!(record.is_valid(Utc::now()));

        assert!(db.tokens().find("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_strings_are_unique() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = seed_user(&db).await;
        let expires = Utc::now() + Duration::days(7);

        db.tokens().create(user_id, "tok-1", expires).await.unwrap();
        assert!(db.tokens().create(user_id, "tok-1", expires).await.is_err());
    }

    #[tokio::test]
    async fn test_revoke_is_terminal_and_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = seed_user(&db).await;
        let expires = Utc::now() + Duration::days(7);
        db.tokens().create(user_id, "tok-1", expires).await.unwrap();

        assert!(db.tokens().revoke("tok-1").await.unwrap());
        assert!(!db.tokens().revoke("tok-1").await.unwrap());
        assert!(!db.tokens().revoke("never-existed").await.unwrap());

        let record = db.tokens().find("tok-1").await.unwrap().unwrap();
        assert!(record.revoked_at.is_some());
        assert!(!record.is_valid(Utc::now()));
    }

    #[tokio::test]
    async fn test_expired_token_is_invalid() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = seed_user(&db).await;
        let expires = Utc::now() - Duration::seconds(1);
        db.tokens().create(user_id, "tok-1", expires).await.unwrap();

        let record = db.tokens().find("tok-1").await.unwrap().unwrap();
        assert!(!record.is_valid(Utc::now()));
    }

    #[tokio::test]
    async fn test_rotate_replaces_token_once() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = seed_user(&db).await;
        let expires = Utc::now() + Duration::days(7);
        db.tokens().create(user_id, "old", expires).await.unwrap();

        assert!(db.tokens().rotate("old", user_id, "new-1", expires).await.unwrap());

        // The old token is spent: a second rotation must lose, and no
        // second replacement may appear.
        assert!(!db.tokens().rotate("old", user_id, "new-2", expires).await.unwrap());

        assert!(db.tokens().find("old").await.unwrap().unwrap().revoked_at.is_some());
        assert!(db.tokens().find("new-1").await.unwrap().is_some());
        assert!(db.tokens().find("new-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_rolls_back_on_insert_failure() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = seed_user(&db).await;
        let expires = Utc::now() + Duration::days(7);
        db.tokens().create(user_id, "old", expires).await.unwrap();
        db.tokens().create(user_id, "taken", expires).await.unwrap();

        // Colliding replacement string violates UNIQUE; the old token
        // must not be left revoked with nothing to replace it.
        assert!(db.tokens().rotate("old", user_id, "taken", expires).await.is_err());
        let old = db.tokens().find("old").await.unwrap().unwrap();
        assert!(old.revoked_at.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_prunes_only_expired() {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = seed_user(&db).await;

        db.tokens()
            .create(user_id, "stale", Utc::now() - Duration::days(40))
            .await
            .unwrap();
        db.tokens()
            .create(user_id, "fresh", Utc::now() + Duration::days(7))
            .await
            .unwrap();

        let pruned = db
            .tokens()
            .delete_expired_before(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert!(db.tokens().find("stale").await.unwrap().is_none());
        assert!(db.tokens().find("fresh").await.unwrap().is_some());
    }
}
