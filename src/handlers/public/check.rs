use axum::{extract::State, http::HeaderMap, http::StatusCode};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::engine::{self, CheckOutcome, TimeLeft};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::keygen;
use crate::models::{CheckStatus, MAX_PRODUCT_CODE_LEN};
use crate::util::{CheckRecordBuilder, fingerprint, is_secure_request};

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub key: String,
    pub hwid: String,
    pub product_code: String,
}

impl CheckRequest {
    /// Keys that could never have been issued are rejected here, before the
    /// limiter or the store sees them.
    fn validate(&self) -> Result<()> {
        if !keygen::is_well_formed(&self.key) {
            return Err(AppError::BadRequest(msg::KEY_FORMAT.into()));
        }
        if !(5..=200).contains(&self.hwid.chars().count()) {
            return Err(AppError::BadRequest(msg::HWID_LENGTH.into()));
        }
        if !(1..=MAX_PRODUCT_CODE_LEN).contains(&self.product_code.chars().count()) {
            return Err(AppError::BadRequest(msg::PRODUCT_CODE_INVALID.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub status: CheckStatus,
    /// Seconds, `"unbounded"` for lifetime licenses, null when the outcome
    /// carries no license information.
    pub time_left: Option<TimeLeft>,
    pub human_time_left: Option<String>,
    pub is_lifetime: bool,
    pub product_name: Option<String>,
    /// Null when active, otherwise the same code as `status`.
    pub error: Option<CheckStatus>,
}

impl CheckResponse {
    /// Response that reveals nothing about any license.
    fn bare(status: CheckStatus) -> Self {
        Self {
            status,
            time_left: None,
            human_time_left: None,
            is_lifetime: false,
            product_name: None,
            error: Some(status),
        }
    }

    fn from_result(result: &queries::CheckResult, now: i64) -> Self {
        let Some(found) = &result.license else {
            return Self::bare(CheckStatus::Invalid);
        };
        let license = &found.license;

        let status = match result.outcome {
            CheckOutcome::Activated | CheckOutcome::Valid => CheckStatus::Active,
            CheckOutcome::Expired => CheckStatus::Expired,
            CheckOutcome::Paused => CheckStatus::Paused,
            CheckOutcome::HwidMismatch => CheckStatus::HwidMismatch,
            CheckOutcome::Invalid => return Self::bare(CheckStatus::Invalid),
        };
        let time_left = match status {
            CheckStatus::HwidMismatch => None,
            _ => Some(engine::time_left(license, now)),
        };

        Self {
            status,
            time_left,
            human_time_left: time_left.map(TimeLeft::human),
            is_lifetime: license.is_lifetime,
            product_name: Some(found.product_name.clone()),
            error: (status != CheckStatus::Active).then_some(status),
        }
    }
}

/// POST /license/check
///
/// Policy outcomes (expired, paused, hwid mismatch, invalid) are answered
/// with 200 and a structured body; only throttling changes the status code.
///
/// The body is parsed after the transport check, so a plaintext request gets
/// `ssl_error` whatever it carries.
pub async fn check_license(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CheckRequest>, AppError>,
) -> Result<(StatusCode, Json<CheckResponse>)> {
    if state.require_tls && !is_secure_request(&headers) {
        return Ok((StatusCode::OK, Json(CheckResponse::bare(CheckStatus::SslError))));
    }

    let Json(req) = payload?;
    req.validate()?;

    if let Err(limit) = state.check_limiter.check(&req.key, &req.hwid) {
        tracing::warn!(
            key = %fingerprint(&req.key),
            hwid = %fingerprint(&req.hwid),
            ?limit,
            "License check throttled"
        );
        return Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(CheckResponse::bare(CheckStatus::TooManyRequests)),
        ));
    }

    let now = Utc::now().timestamp();
    let result = {
        let mut conn = state.db.get()?;
        queries::check_license(&mut conn, &req.key, &req.product_code, &req.hwid, now)?
    };
    let license_id = result.license.as_ref().map(|l| l.license.id.as_str());

    match result.outcome {
        CheckOutcome::Activated => tracing::info!(
            license_id = license_id.unwrap_or_default(),
            hwid = %fingerprint(&req.hwid),
            "License activated"
        ),
        CheckOutcome::Invalid => tracing::debug!(
            key = %fingerprint(&req.key),
            product_code = %req.product_code,
            "License check for unknown key"
        ),
        outcome => tracing::debug!(
            license_id = license_id.unwrap_or_default(),
            outcome = outcome.as_ref(),
            "License checked"
        ),
    }

    // Registry failures never change the answer.
    let recorded = state.registry.get().map_err(AppError::from).and_then(|conn| {
        CheckRecordBuilder::new(&conn, state.registry_enabled, &headers)
            .credentials(&req.key, &req.hwid)
            .license(license_id)
            .outcome(result.outcome)
            .at(now)
            .save()
    });
    if let Err(e) = recorded {
        tracing::warn!(
            license_id = license_id.unwrap_or_default(),
            "Failed to record check: {}",
            e
        );
    }

    Ok((StatusCode::OK, Json(CheckResponse::from_result(&result, now))))
}
