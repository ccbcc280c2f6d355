use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::error::AppError;
use crate::util::extract_bearer_token;

/// Check the bearer token against the configured admin key in constant time.
fn authenticate_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let expected = state
        .admin_api_key
        .as_deref()
        .ok_or(AppError::Unauthorized)?;
    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;

    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(e) = authenticate_admin(&state, request.headers()) {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(e);
    }
    Ok(next.run(request).await)
}
