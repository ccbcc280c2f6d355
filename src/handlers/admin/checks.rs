use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::{Json, Path, Query};
use crate::id::EntityType;
use crate::models::CheckRecord;
use crate::pagination::{Paginated, PaginationQuery};

/// GET /admin/licenses/{id}/checks
///
/// Records outlive their license, so a deleted license still lists its
/// history.
pub async fn list_license_checks(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<CheckRecord>>> {
    if !EntityType::License.is_valid_id(&id) {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    }
    let conn = state.registry.get()?;
    let limit = query.limit();
    let offset = query.offset();
    let (items, total) = queries::list_check_records_for_license(&conn, &id, limit, offset)?;
    Ok(Json(Paginated::new(items, total, limit, offset)))
}
