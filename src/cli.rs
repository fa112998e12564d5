//! CLI argument parsing, validation, and startup helpers.
//!
//! Configuration problems (missing or short signing secret, unreadable
//! database) are fatal here, before the server accepts a single
//! request.

use clap::Parser;
use tracing::{error, info};

use crate::ServerConfig;
use crate::db::Database;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Finchbook",
    about = "Personal finance tracker with role-based access control"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7310")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "finchbook.db")]
    pub database: String,

    /// Path to file containing the JWT signing secret. Prefer the JWT_SECRET env var
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// JWT issuer claim
    #[arg(long, default_value = "finchbook")]
    pub issuer: String,

    /// JWT audience claim
    #[arg(long, default_value = "finchbook-web")]
    pub audience: String,

    /// Access token lifetime in minutes
    #[arg(long, default_value = "15")]
    pub access_token_minutes: i64,

    /// Refresh token lifetime in days
    #[arg(long, default_value = "7")]
    pub refresh_token_days: i64,

    /// Set the Secure flag on auth cookies (enable behind HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the JWT secret from the environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Validate token lifetimes. Returns false and logs an error on nonsense
/// values.
pub fn validate_lifetimes(args: &Args) -> bool {
    if args.access_token_minutes < 1 {
        error!("Access token lifetime must be at least 1 minute");
        return false;
    }
    if args.refresh_token_days < 1 {
        error!("Refresh token lifetime must be at least 1 day");
        return false;
    }
    true
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        issuer: args.issuer.clone(),
        audience: args.audience.clone(),
        access_token_minutes: args.access_token_minutes,
        refresh_token_days: args.refresh_token_days,
        secure_cookies: args.secure_cookies,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
