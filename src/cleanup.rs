//! Scheduled cleanup of stale refresh tokens.
//!
//! Revocation never deletes rows, so the table grows with every logout
//! and rotation. A background task prunes rows whose expiry is long
//! past; revoked-but-recent rows stay visible for replay diagnostics.

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{error, info};

use crate::db::Database;

/// Grace period after expiry before a token row is pruned.
const EXPIRED_TOKEN_GRACE_DAYS: i64 = 30;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    let cutoff = Utc::now() - ChronoDuration::days(EXPIRED_TOKEN_GRACE_DAYS);
    match db.tokens().delete_expired_before(cutoff).await {
        Ok(count) if count > 0 => info!("Cleaned up {} stale refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up refresh tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
