//! Test utilities and fixtures for Licensor integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::Value;
use std::sync::Arc;

// Re-export the main library crate
pub use licensor::db::{AppState, init_db, init_registry_db, queries};
pub use licensor::engine;
pub use licensor::handlers::admin;
pub use licensor::handlers::public::{check_license, health};
pub use licensor::models::*;
pub use licensor::rate_limit::CheckRateLimiter;

pub const ONE_HOUR: i64 = 3600;
pub const ONE_DAY: i64 = 86400;

pub const TEST_ADMIN_KEY: &str = "test-admin-key";
pub const TEST_HWID: &str = "HWID-MACHINE-0001";
pub const OTHER_HWID: &str = "HWID-MACHINE-0002";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an in-memory test registry database with schema initialized
pub fn setup_test_registry_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory registry database");
    init_registry_db(&conn).expect("Failed to initialize registry schema");
    conn
}

/// Create a test product
pub fn create_test_product(conn: &Connection, name: &str, product_code: &str) -> Product {
    let input = CreateProduct {
        name: name.to_string(),
        product_code: product_code.to_string(),
    };
    queries::create_product(conn, &input).expect("Failed to create test product")
}

/// Create `count` unused licenses for a product
pub fn create_test_licenses(
    conn: &mut Connection,
    product_id: &str,
    duration: i64,
    is_lifetime: bool,
    count: u32,
) -> Vec<License> {
    let input = CreateLicenses {
        product_id: product_id.to_string(),
        duration,
        is_lifetime,
        description: None,
        count,
    };
    queries::create_licenses(conn, &input, now()).expect("Failed to create test licenses")
}

/// Create a single unused license
pub fn create_test_license(conn: &mut Connection, product_id: &str, duration: i64) -> License {
    create_test_licenses(conn, product_id, duration, false, 1)
        .pop()
        .expect("one license")
}

/// Backdate a license's activation (and optionally pause) directly in the
/// database, for time-dependent scenarios.
pub fn set_license_times(
    conn: &Connection,
    license_id: &str,
    status: LicenseStatus,
    hwid: Option<&str>,
    activated_at: Option<i64>,
    paused_at: Option<i64>,
) {
    conn.execute(
        "UPDATE licenses SET status = ?1, hwid = ?2, activated_at = ?3, paused_at = ?4
         WHERE id = ?5",
        rusqlite::params![status.as_ref(), hwid, activated_at, paused_at, license_id],
    )
    .expect("Failed to update license times");
}

pub fn get_license(conn: &Connection, license_id: &str) -> License {
    queries::get_license_by_id(conn, license_id)
        .expect("query failed")
        .expect("license exists")
}

/// A well-formed key that no license carries
pub fn unissued_key() -> String {
    licensor::keygen::generate_license_key().expect("entropy available")
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn memory_pool() -> Pool<SqliteConnectionManager> {
    // One connection: every pooled in-memory connection would be its own database
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    Pool::builder().max_size(1).build(manager).unwrap()
}

/// Create an AppState for testing with in-memory databases
pub fn create_test_app_state() -> AppState {
    create_test_app_state_with_limiter(CheckRateLimiter::new(1000, 1000))
}

pub fn create_test_app_state_with_limiter(limiter: CheckRateLimiter) -> AppState {
    let pool = memory_pool();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    let registry_pool = memory_pool();
    {
        let conn = registry_pool.get().unwrap();
        init_registry_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        registry: registry_pool,
        registry_enabled: true,
        require_tls: false,
        admin_api_key: Some(Arc::from(TEST_ADMIN_KEY)),
        check_limiter: Arc::new(limiter),
    }
}

/// Create a Router with the public endpoints (without per-IP rate limiting,
/// which needs connect info)
pub fn public_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/license/check", post(check_license))
        .with_state(state)
}

/// Create a Router with the admin endpoints, without the auth layer
pub fn admin_app(state: AppState) -> Router {
    admin::routes().with_state(state)
}

/// Create a Router with the admin endpoints behind the bearer-token gate
pub fn authed_admin_app(state: AppState) -> Router {
    admin::router(state.clone()).with_state(state)
}

/// Build a POST /license/check request
pub fn check_request(key: &str, hwid: &str, product_code: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/license/check")
        .header("content-type", "application/json")
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-for", "203.0.113.7")
        .header("user-agent", "licensor-tests/1.0")
        .body(Body::from(
            serde_json::json!({
                "key": key,
                "hwid": hwid,
                "product_code": product_code,
            })
            .to_string(),
        ))
        .unwrap()
}

/// Build a JSON request
pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a request without a body
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Read a response body as JSON
pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).expect("Response should be valid JSON")
}
