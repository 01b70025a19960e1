//! Service configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The external API credentials and the
//! PostgreSQL URL are required; everything else has a default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level service configuration.
///
/// Loaded once at startup via [`WardenConfig::from_env`].
#[derive(Debug, Clone)]
pub struct WardenConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Shared secret for the control-plane backfill endpoint.
    pub secret_key: String,

    /// PostgreSQL connection string.
    pub database_url: String,

    /// Maximum number of database connections in the pool.
    pub database_max_connections: u32,

    /// Timeout in seconds for acquiring a database connection.
    pub database_connect_timeout_secs: u64,

    /// Application key for the external board API.
    pub api_key: String,

    /// Base URL of the external board API.
    pub api_base_url: String,

    /// Redis URL for the admin cache; empty means use the in-process cache.
    pub redis_url: String,

    /// Directory for replicated attachment bytes.
    pub attachment_dir: PathBuf,

    /// Delay before processing a card that arrived from another tracked
    /// board, giving the source board's events time to clear its records.
    pub move_settle_delay: Duration,

    /// TTL for confirmed-admin cache entries.
    pub admin_cache_ttl: Duration,

    /// TTL for the attachment replication de-duplication guard.
    pub replication_guard_ttl: Duration,
}

impl WardenConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when an optional variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` cannot be parsed as a
    /// [`SocketAddr`], or if a required variable (`SECRET_KEY`,
    /// `DATABASE_URL`, `BOARD_API_KEY`) is missing.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let secret_key = require_env("SECRET_KEY")?;
        let database_url = require_env("DATABASE_URL")?;
        let api_key = require_env("BOARD_API_KEY")?;

        let api_base_url = std::env::var("BOARD_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.trello.com".to_string());

        let database_max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 10);
        let database_connect_timeout_secs = parse_env("DATABASE_CONNECT_TIMEOUT_SECS", 5);

        let redis_url = std::env::var("REDIS_URL").unwrap_or_default();

        let attachment_dir = PathBuf::from(
            std::env::var("ATTACHMENT_DIR").unwrap_or_else(|_| "./attachments".to_string()),
        );

        let move_settle_delay = Duration::from_millis(parse_env("MOVE_SETTLE_DELAY_MS", 2_000));
        let admin_cache_ttl = Duration::from_secs(parse_env("ADMIN_CACHE_TTL_SECS", 7_200));
        let replication_guard_ttl =
            Duration::from_secs(parse_env("REPLICATION_GUARD_TTL_SECS", 60));

        Ok(Self {
            listen_addr,
            secret_key,
            database_url,
            database_max_connections,
            database_connect_timeout_secs,
            api_key,
            api_base_url,
            redis_url,
            attachment_dir,
            move_settle_delay,
            admin_cache_ttl,
            replication_guard_ttl,
        })
    }
}

/// Reads a required environment variable, failing with the variable name.
fn require_env(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("missing required environment variable {key}"))
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
