use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, EnumString};

use crate::engine::{self, EffectiveStatus, TimeLeft};
use crate::error::{AppError, Result, msg};
use crate::pagination::PaginationQuery;

/// Most licenses a single bulk-create request may generate.
pub const MAX_BULK_COUNT: u32 = 100;

/// Longest operator note accepted on a license.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Deserialize a double Option field where:
/// - Field absent in JSON → None (don't update)
/// - Field present with null → Some(None) (set to NULL in DB)
/// - Field present with value → Some(Some(value)) (set to value)
fn deserialize_optional_nullable<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<T> = Option::deserialize(deserializer)?;
    Ok(Some(value))
}

/// Persisted license state. Pause and time-based expiry are folded in at
/// read time by the engine, never stored here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LicenseStatus {
    Unused,
    Active,
    Expired,
}

#[derive(Debug, Clone, Serialize)]
pub struct License {
    pub id: String,
    pub product_id: String,
    pub license_key: String,
    /// Seconds of validity counted from first activation.
    pub duration: i64,
    pub is_lifetime: bool,
    pub status: LicenseStatus,
    /// Hardware id the license is bound to. None = not yet bound.
    pub hwid: Option<String>,
    pub description: Option<String>,
    pub activated_at: Option<i64>,
    pub paused_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseWithProduct {
    #[serde(flatten)]
    pub license: License,
    pub product_name: String,
    pub product_code: String,
}

/// License plus the display fields derived from it at a given instant.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseDetails {
    #[serde(flatten)]
    pub license: LicenseWithProduct,
    pub computed_status: EffectiveStatus,
    pub time_left: TimeLeft,
    pub time_left_human: String,
    pub duration_human: String,
    pub is_expired: bool,
}

impl LicenseDetails {
    pub fn at(license: LicenseWithProduct, now: i64) -> Self {
        let inner = &license.license;
        let time_left = engine::time_left(inner, now);
        Self {
            computed_status: engine::computed_status(inner, now),
            time_left,
            time_left_human: time_left.human(),
            duration_human: engine::duration_human(inner),
            is_expired: engine::is_expired(inner, now),
            license,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLicenses {
    pub product_id: String,
    pub duration: i64,
    #[serde(default)]
    pub is_lifetime: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl CreateLicenses {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BULK_COUNT).contains(&self.count) {
            return Err(AppError::BadRequest(msg::COUNT_OUT_OF_RANGE.into()));
        }
        if self.duration < 1 {
            return Err(AppError::BadRequest(msg::DURATION_NOT_POSITIVE.into()));
        }
        validate_description(self.description.as_deref())
    }
}

/// Operator override of status and/or description. Bypasses the state
/// machine: setting `active` on an expired license revives it as-is.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLicense {
    #[serde(default)]
    pub status: Option<LicenseStatus>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub description: Option<Option<String>>,
}

impl UpdateLicense {
    pub fn validate(&self) -> Result<()> {
        if self.status.is_none() && self.description.is_none() {
            return Err(AppError::BadRequest(msg::NOTHING_TO_UPDATE.into()));
        }
        if self.status == Some(LicenseStatus::Unused) {
            return Err(AppError::BadRequest(msg::STATUS_OVERRIDE_INVALID.into()));
        }
        if let Some(Some(ref description)) = self.description {
            validate_description(Some(description))?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AddTime {
    pub seconds: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LicenseFilter {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub status: Option<LicenseStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl LicenseFilter {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

fn validate_description(description: Option<&str>) -> Result<()> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => {
            Err(AppError::BadRequest(msg::DESCRIPTION_TOO_LONG.into()))
        }
        _ => Ok(()),
    }
}
