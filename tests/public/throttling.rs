//! Tests for per-key and per-hwid check throttling.

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use common::*;
use tower::ServiceExt;

fn setup(limiter: CheckRateLimiter) -> (AppState, License) {
    let state = create_test_app_state_with_limiter(limiter);
    let license = {
        let mut conn = state.db.get().unwrap();
        let product = create_test_product(&conn, "Demo App", "demo-app");
        create_test_license(&mut conn, &product.id, ONE_HOUR)
    };
    (state, license)
}

#[tokio::test]
async fn test_key_burst_is_throttled() {
    let (state, license) = setup(CheckRateLimiter::new(2, 100));

    for _ in 0..2 {
        let response = public_app(state.clone())
            .oneshot(check_request(&license.license_key, TEST_HWID, "demo-app"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = public_app(state.clone())
        .oneshot(check_request(&license.license_key, TEST_HWID, "demo-app"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = body_json(response).await;
    assert_eq!(body["status"], "too_many_requests");
    assert_eq!(body["error"], "too_many_requests");
    assert!(body["time_left"].is_null());
}

#[tokio::test]
async fn test_hwid_burst_across_keys_is_throttled() {
    let (state, _license) = setup(CheckRateLimiter::new(100, 1));

    let first = public_app(state.clone())
        .oneshot(check_request(&unissued_key(), TEST_HWID, "demo-app"))
        .await
        .unwrap();
    let second = public_app(state.clone())
        .oneshot(check_request(&unissued_key(), TEST_HWID, "demo-app"))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_throttled_checks_do_not_change_state_or_registry() {
    let (state, license) = setup(CheckRateLimiter::new(1, 100));

    // Exhaust the key quota with an unrelated machine's invalid product code
    public_app(state.clone())
        .oneshot(check_request(&license.license_key, OTHER_HWID, "nope-app"))
        .await
        .unwrap();
    let throttled = public_app(state.clone())
        .oneshot(check_request(&license.license_key, TEST_HWID, "demo-app"))
        .await
        .unwrap();
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);

    let conn = state.db.get().unwrap();
    assert_eq!(get_license(&conn, &license.id).status, LicenseStatus::Unused);
    let registry = state.registry.get().unwrap();
    let (_, total) =
        queries::list_check_records_for_license(&registry, &license.id, 50, 0).unwrap();
    assert_eq!(total, 0);
}
