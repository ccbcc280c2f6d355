use serde::Serialize;
use strum::{AsRefStr, EnumString};

/// Status code reported to client software by the check endpoint.
///
/// Wider than [`super::LicenseStatus`]: it also covers lookup misses and
/// requests rejected before any lookup happens. Never persisted on a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckStatus {
    Active,
    Expired,
    Invalid,
    HwidMismatch,
    Paused,
    TooManyRequests,
    SslError,
}

/// One check attempt that reached the license store.
///
/// Keys and hardware ids are stored as fingerprints only.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRecord {
    pub id: String,
    /// None when the key/product pair matched nothing.
    pub license_id: Option<String>,
    pub key_fingerprint: String,
    pub hwid_fingerprint: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub outcome: String,
    pub created_at: i64,
}
