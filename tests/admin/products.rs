//! Tests for the admin product endpoints.

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_create_product() {
    let state = create_test_app_state();

    let response = admin_app(state)
        .oneshot(json_request(
            "POST",
            "/admin/products",
            json!({ "name": "Demo App", "product_code": "demo-app" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert!(body["id"].as_str().unwrap().starts_with("prod_"));
    assert_eq!(body["name"], "Demo App");
    assert_eq!(body["product_code"], "demo-app");
}

#[tokio::test]
async fn test_create_product_validation_and_conflict() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        create_test_product(&conn, "Demo App", "demo-app");
    }

    let blank = admin_app(state.clone())
        .oneshot(json_request(
            "POST",
            "/admin/products",
            json!({ "name": "  ", "product_code": "x-app" }),
        ))
        .await
        .unwrap();
    let long_code = admin_app(state.clone())
        .oneshot(json_request(
            "POST",
            "/admin/products",
            json!({ "name": "Long", "product_code": "c".repeat(51) }),
        ))
        .await
        .unwrap();
    let duplicate = admin_app(state)
        .oneshot(json_request(
            "POST",
            "/admin/products",
            json!({ "name": "Again", "product_code": "demo-app" }),
        ))
        .await
        .unwrap();

    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert_eq!(long_code.status(), StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_and_get_products_with_counts() {
    let state = create_test_app_state();
    let product = {
        let mut conn = state.db.get().unwrap();
        let product = create_test_product(&conn, "Demo App", "demo-app");
        create_test_product(&conn, "Other", "other-app");
        create_test_licenses(&mut conn, &product.id, ONE_DAY, false, 3);
        product
    };

    let list = admin_app(state.clone())
        .oneshot(empty_request("GET", "/admin/products?limit=1"))
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    let body = body_json(list).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let one = admin_app(state)
        .oneshot(empty_request("GET", &format!("/admin/products/{}", product.id)))
        .await
        .unwrap();
    assert_eq!(one.status(), StatusCode::OK);
    let body = body_json(one).await;
    assert_eq!(body["license_count"], 3);
    assert_eq!(body["product_code"], "demo-app");
}

#[tokio::test]
async fn test_get_unknown_or_malformed_product_is_not_found() {
    let state = create_test_app_state();

    for uri in [
        "/admin/products/prod_00000000000000000000000000000000",
        "/admin/products/not-an-id",
    ] {
        let response = admin_app(state.clone())
            .oneshot(empty_request("GET", uri))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}
