//! Tests for transport requirements and response hardening.

#[path = "../common/mod.rs"]
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::*;
use licensor::middleware::with_secure_headers;
use tower::ServiceExt;

fn plain_http_check(key: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/license/check")
        .header("content-type", "application/json")
        .header("x-forwarded-proto", "http")
        .body(Body::from(
            serde_json::json!({
                "key": key,
                "hwid": TEST_HWID,
                "product_code": "demo-app",
            })
            .to_string(),
        ))
        .unwrap()
}

fn tls_state() -> (AppState, License) {
    let mut state = create_test_app_state();
    state.require_tls = true;
    let license = {
        let mut conn = state.db.get().unwrap();
        let product = create_test_product(&conn, "Demo App", "demo-app");
        create_test_license(&mut conn, &product.id, ONE_HOUR)
    };
    (state, license)
}

#[tokio::test]
async fn test_plain_http_is_refused_without_touching_license() {
    let (state, license) = tls_state();

    let response = public_app(state.clone())
        .oneshot(plain_http_check(&license.license_key))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ssl_error");
    assert_eq!(body["error"], "ssl_error");
    assert!(body["product_name"].is_null());

    let conn = state.db.get().unwrap();
    assert_eq!(get_license(&conn, &license.id).status, LicenseStatus::Unused);
}

#[tokio::test]
async fn test_plain_http_with_malformed_body_still_gets_ssl_error() {
    let (state, license) = tls_state();

    for body in [r#"{"key":"ABCDE"}"#, "not json", ""] {
        let request = Request::builder()
            .method("POST")
            .uri("/license/check")
            .header("content-type", "application/json")
            .header("x-forwarded-proto", "http")
            .body(Body::from(body))
            .unwrap();

        let response = public_app(state.clone()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK, "body {:?}", body);
        assert_eq!(body_json(response).await["status"], "ssl_error");
    }

    let conn = state.db.get().unwrap();
    assert_eq!(get_license(&conn, &license.id).status, LicenseStatus::Unused);
}

#[tokio::test]
async fn test_forwarded_https_is_accepted() {
    let (state, license) = tls_state();

    let response = public_app(state)
        .oneshot(check_request(&license.license_key, TEST_HWID, "demo-app"))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn test_tls_not_required_accepts_plain_http() {
    let state = create_test_app_state();
    let license = {
        let mut conn = state.db.get().unwrap();
        let product = create_test_product(&conn, "Demo App", "demo-app");
        create_test_license(&mut conn, &product.id, ONE_HOUR)
    };

    let response = public_app(state)
        .oneshot(plain_http_check(&license.license_key))
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn test_secure_headers_on_every_response() {
    let app = with_secure_headers(public_app(create_test_app_state()));

    let response = app
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
    assert!(headers.contains_key(header::REFERRER_POLICY));
}
