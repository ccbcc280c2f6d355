mod from_row;
mod schema;
pub mod queries;

pub use from_row::{FromRow, query_all, query_one};
pub use schema::{init_db, init_registry_db};

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::rate_limit::CheckRateLimiter;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding database pools and configuration
#[derive(Clone)]
pub struct AppState {
    /// Main database pool (products, licenses)
    pub db: DbPool,
    /// Check registry pool (separate file to isolate growth)
    pub registry: DbPool,
    /// Whether check attempts are written to the registry
    pub registry_enabled: bool,
    /// Reject checks that did not arrive over TLS
    pub require_tls: bool,
    /// Bearer token for the admin surface (None = admin disabled)
    pub admin_api_key: Option<Arc<str>>,
    /// Per-key / per-hwid limiter for the check endpoint
    pub check_limiter: Arc<CheckRateLimiter>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
    });
    Pool::builder().max_size(10).build(manager)
}
