use axum::{extract::State, http::StatusCode};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::id::EntityType;
use crate::models::{CreateProduct, Product, ProductWithLicenseCount};
use crate::pagination::{Paginated, PaginationQuery};

/// POST /admin/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    input.validate()?;
    let conn = state.db.get()?;
    let product = queries::create_product(&conn, &input)?;

    tracing::info!(
        product_id = %product.id,
        product_code = %product.product_code,
        "Product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /admin/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<ProductWithLicenseCount>>> {
    let conn = state.db.get()?;
    let limit = query.limit();
    let offset = query.offset();
    let (items, total) = queries::list_products_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

/// GET /admin/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductWithLicenseCount>> {
    if !EntityType::Product.is_valid_id(&id) {
        return Err(AppError::NotFound(msg::PRODUCT_NOT_FOUND.into()));
    }
    let conn = state.db.get()?;
    let product =
        queries::get_product_with_count(&conn, &id)?.or_not_found(msg::PRODUCT_NOT_FOUND)?;
    Ok(Json(product))
}
