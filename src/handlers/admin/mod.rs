mod checks;
mod licenses;
mod products;

pub use checks::*;
pub use licenses::*;
pub use products::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

/// Operator routes, all behind the admin bearer token.
pub fn router(state: AppState) -> Router<AppState> {
    routes().layer(middleware::from_fn_with_state(state, admin_auth))
}

/// The admin routes without the auth layer.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/products", post(create_product).get(list_products))
        .route("/admin/products/{id}", get(get_product))
        .route("/admin/licenses", post(create_licenses).get(list_licenses))
        .route(
            "/admin/licenses/{id}",
            get(get_license).put(update_license).delete(delete_license),
        )
        .route("/admin/licenses/{id}/reset-hwid", post(reset_hwid))
        .route("/admin/licenses/{id}/pause", post(pause_license))
        .route("/admin/licenses/{id}/unpause", post(unpause_license))
        .route("/admin/licenses/{id}/add-time", post(add_time))
        .route("/admin/licenses/{id}/checks", get(list_license_checks))
}
