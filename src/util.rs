//! Shared request helpers.

use axum::http::HeaderMap;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db::queries::{self, NewCheckRecord};
use crate::engine::CheckOutcome;
use crate::error::Result;
use crate::models::CheckRecord;

/// Hex characters kept from a fingerprint digest.
const FINGERPRINT_LEN: usize = 16;

/// Short, stable SHA-256 fingerprint of a secret-ish value (license key,
/// hwid) for logs and the check registry.
pub fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address as reported by the reverse proxy: the first hop of
/// `x-forwarded-for`, else `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
}

pub fn user_agent(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "user-agent")
}

/// Token from `Authorization: Bearer <token>`. Empty tokens count as absent.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "authorization")
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Whether the request reached us over TLS.
///
/// TLS terminates at the reverse proxy, which reports the original scheme in
/// `x-forwarded-proto`.
pub fn is_secure_request(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Builder for check registry entries.
///
/// # Example
/// ```ignore
/// CheckRecordBuilder::new(&registry_conn, state.registry_enabled, &headers)
///     .credentials(&req.key, &req.hwid)
///     .license(Some(&license.id))
///     .outcome(CheckOutcome::Valid)
///     .save()?;
/// ```
pub struct CheckRecordBuilder<'a> {
    conn: &'a Connection,
    enabled: bool,
    headers: &'a HeaderMap,
    license_id: Option<&'a str>,
    key: &'a str,
    hwid: &'a str,
    outcome: CheckOutcome,
    at: Option<i64>,
}

impl<'a> CheckRecordBuilder<'a> {
    pub fn new(conn: &'a Connection, enabled: bool, headers: &'a HeaderMap) -> Self {
        Self {
            conn,
            enabled,
            headers,
            license_id: None,
            key: "",
            hwid: "",
            outcome: CheckOutcome::Invalid,
            at: None,
        }
    }

    /// Raw key and hwid from the request. Only fingerprints are stored.
    pub fn credentials(mut self, key: &'a str, hwid: &'a str) -> Self {
        self.key = key;
        self.hwid = hwid;
        self
    }

    pub fn license(mut self, license_id: Option<&'a str>) -> Self {
        self.license_id = license_id;
        self
    }

    pub fn outcome(mut self, outcome: CheckOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Timestamp of the check (defaults to now).
    pub fn at(mut self, timestamp: i64) -> Self {
        self.at = Some(timestamp);
        self
    }

    pub fn save(self) -> Result<CheckRecord> {
        let key_fingerprint = fingerprint(self.key);
        let hwid_fingerprint = fingerprint(self.hwid);
        queries::create_check_record(
            self.conn,
            self.enabled,
            &NewCheckRecord {
                license_id: self.license_id,
                key_fingerprint: &key_fingerprint,
                hwid_fingerprint: &hwid_fingerprint,
                ip_address: client_ip(self.headers),
                user_agent: user_agent(self.headers),
                outcome: self.outcome.as_ref(),
                created_at: self.at,
            },
        )
    }
}
