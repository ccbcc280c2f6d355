use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::id::EntityType;
use crate::models::{
    AddTime, CreateLicenses, License, LicenseDetails, LicenseFilter, UpdateLicense,
};
use crate::pagination::Paginated;

#[derive(Debug, Serialize)]
pub struct CreatedLicenses {
    pub items: Vec<License>,
}

fn require_license_id(id: &str) -> Result<()> {
    if EntityType::License.is_valid_id(id) {
        Ok(())
    } else {
        Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()))
    }
}

/// POST /admin/licenses
/// Bulk-create `count` unused licenses for one product.
pub async fn create_licenses(
    State(state): State<AppState>,
    Json(input): Json<CreateLicenses>,
) -> Result<(StatusCode, Json<CreatedLicenses>)> {
    input.validate()?;
    let mut conn = state.db.get()?;
    let items = queries::create_licenses(&mut conn, &input, Utc::now().timestamp())?;

    tracing::info!(
        product_id = %input.product_id,
        count = items.len(),
        duration = input.duration,
        is_lifetime = input.is_lifetime,
        "Licenses created"
    );
    Ok((StatusCode::CREATED, Json(CreatedLicenses { items })))
}

/// GET /admin/licenses
pub async fn list_licenses(
    State(state): State<AppState>,
    Query(filter): Query<LicenseFilter>,
) -> Result<Json<Paginated<LicenseDetails>>> {
    let conn = state.db.get()?;
    let page = filter.pagination();
    let limit = page.limit();
    let offset = page.offset();
    let (licenses, total) = queries::list_licenses_paginated(&conn, &filter, limit, offset)?;

    let now = Utc::now().timestamp();
    let items = licenses
        .into_iter()
        .map(|license| LicenseDetails::at(license, now))
        .collect();
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

/// GET /admin/licenses/{id}
pub async fn get_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LicenseDetails>> {
    require_license_id(&id)?;
    let conn = state.db.get()?;
    let license =
        queries::get_license_with_product(&conn, &id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;
    Ok(Json(LicenseDetails::at(license, Utc::now().timestamp())))
}

/// PUT /admin/licenses/{id}
/// Direct status/description override. Does not go through the state machine.
pub async fn update_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateLicense>,
) -> Result<Json<LicenseDetails>> {
    require_license_id(&id)?;
    input.validate()?;
    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let license = queries::update_license(&mut conn, &id, &input, now)?;

    tracing::info!(
        license_id = %id,
        status = ?input.status,
        description_changed = input.description.is_some(),
        "License overridden"
    );
    Ok(Json(LicenseDetails::at(license, now)))
}

/// POST /admin/licenses/{id}/reset-hwid
pub async fn reset_hwid(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LicenseDetails>> {
    require_license_id(&id)?;
    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let license = queries::reset_license_hwid(&mut conn, &id, now)?;

    tracing::info!(license_id = %id, "License hwid reset");
    Ok(Json(LicenseDetails::at(license, now)))
}

/// POST /admin/licenses/{id}/pause
pub async fn pause_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LicenseDetails>> {
    require_license_id(&id)?;
    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let license = queries::pause_license(&mut conn, &id, now)?;

    tracing::info!(license_id = %id, "License paused");
    Ok(Json(LicenseDetails::at(license, now)))
}

/// POST /admin/licenses/{id}/unpause
pub async fn unpause_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LicenseDetails>> {
    require_license_id(&id)?;
    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let license = queries::unpause_license(&mut conn, &id, now)?;

    tracing::info!(
        license_id = %id,
        duration = license.license.duration,
        "License unpaused"
    );
    Ok(Json(LicenseDetails::at(license, now)))
}

/// POST /admin/licenses/{id}/add-time
pub async fn add_time(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<AddTime>,
) -> Result<Json<LicenseDetails>> {
    require_license_id(&id)?;
    if input.seconds < 1 {
        return Err(AppError::BadRequest(msg::SECONDS_NOT_POSITIVE.into()));
    }
    let now = Utc::now().timestamp();
    let mut conn = state.db.get()?;
    let license = queries::add_license_time(&mut conn, &id, input.seconds, now)?;

    tracing::info!(license_id = %id, seconds = input.seconds, "License time added");
    Ok(Json(LicenseDetails::at(license, now)))
}

/// DELETE /admin/licenses/{id}
pub async fn delete_license(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    require_license_id(&id)?;
    let conn = state.db.get()?;
    if !queries::delete_license(&conn, &id)? {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    }

    tracing::info!(license_id = %id, "License deleted");
    Ok(StatusCode::NO_CONTENT)
}
