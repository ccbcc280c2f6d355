//! License validation state machine.
//!
//! Everything here is a pure function of a license record and a caller-supplied
//! `now` (unix seconds). The store decides what to persist; the engine only
//! describes the mutation.
//!
//! Persisted states are `unused`, `active` and `expired`. An `active` license
//! is further folded into an effective state:
//! - `paused_at` set → paused (takes priority over time expiry)
//! - not lifetime and `now > activated_at + duration` → expired
//! - otherwise → active

use serde::{Serialize, Serializer};
use strum::AsRefStr;
use thiserror::Error;

use crate::models::{License, LicenseStatus};

/// Effective license state shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EffectiveStatus {
    Unused,
    Active,
    Paused,
    Expired,
}

/// Remaining validity. Lifetime licenses are `Unbounded`, which is never
/// confused with a real zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLeft {
    Seconds(i64),
    Unbounded,
}

impl TimeLeft {
    pub fn seconds(self) -> Option<i64> {
        match self {
            TimeLeft::Seconds(s) => Some(s),
            TimeLeft::Unbounded => None,
        }
    }

    pub fn human(self) -> String {
        match self {
            TimeLeft::Seconds(s) => format_seconds(s),
            TimeLeft::Unbounded => LIFETIME_LABEL.to_string(),
        }
    }
}

impl Serialize for TimeLeft {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TimeLeft::Seconds(s) => serializer.serialize_i64(*s),
            TimeLeft::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

const LIFETIME_LABEL: &str = "Lifetime";

/// Result of evaluating one check against a license that was found.
/// Unknown keys never reach the engine; the store reports them as `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CheckOutcome {
    Activated,
    Valid,
    HwidMismatch,
    Expired,
    Paused,
    Invalid,
}

/// Field changes to write back. `None` leaves a column untouched; the nested
/// options distinguish "set to NULL" from "leave alone".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LicenseUpdate {
    pub status: Option<LicenseStatus>,
    pub hwid: Option<Option<String>>,
    pub activated_at: Option<i64>,
    pub paused_at: Option<Option<i64>>,
    pub duration: Option<i64>,
}

impl LicenseUpdate {
    pub fn is_empty(&self) -> bool {
        self == &LicenseUpdate::default()
    }

    /// Mirror the update onto an in-memory copy after it has been persisted.
    pub fn apply_to(&self, license: &mut License) {
        if let Some(status) = self.status {
            license.status = status;
        }
        if let Some(ref hwid) = self.hwid {
            license.hwid = hwid.clone();
        }
        if let Some(activated_at) = self.activated_at {
            license.activated_at = Some(activated_at);
        }
        if let Some(paused_at) = self.paused_at {
            license.paused_at = paused_at;
        }
        if let Some(duration) = self.duration {
            license.duration = duration;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: CheckOutcome,
    /// Present only when the check changes persisted state.
    pub update: Option<LicenseUpdate>,
}

impl Decision {
    fn read_only(outcome: CheckOutcome) -> Self {
        Self {
            outcome,
            update: None,
        }
    }

    fn with_update(outcome: CheckOutcome, update: LicenseUpdate) -> Self {
        Self {
            outcome,
            update: (!update.is_empty()).then_some(update),
        }
    }
}

/// Evaluate a check of `hwid` against `license` at `now`.
pub fn evaluate(license: &License, hwid: &str, now: i64) -> Decision {
    match license.status {
        // Terminal: no hwid or pause checks once expiry is recorded.
        LicenseStatus::Expired => Decision::read_only(CheckOutcome::Expired),
        LicenseStatus::Unused => Decision::with_update(
            CheckOutcome::Activated,
            LicenseUpdate {
                status: Some(LicenseStatus::Active),
                hwid: Some(Some(hwid.to_string())),
                activated_at: Some(now),
                ..Default::default()
            },
        ),
        LicenseStatus::Active => evaluate_active(license, hwid, now),
    }
}

fn evaluate_active(license: &License, hwid: &str, now: i64) -> Decision {
    if license.paused_at.is_some() {
        return Decision::read_only(CheckOutcome::Paused);
    }

    if is_time_expired(license, now) {
        return Decision::with_update(
            CheckOutcome::Expired,
            LicenseUpdate {
                status: Some(LicenseStatus::Expired),
                ..Default::default()
            },
        );
    }

    match license.hwid.as_deref() {
        Some(bound) if bound != hwid => Decision::read_only(CheckOutcome::HwidMismatch),
        bound => {
            let mut update = LicenseUpdate::default();
            if bound.is_none() {
                update.hwid = Some(Some(hwid.to_string()));
            }
            // Active without an activation stamp only happens after a manual
            // status override.
            if license.activated_at.is_none() {
                update.activated_at = Some(now);
            }
            Decision::with_update(CheckOutcome::Valid, update)
        }
    }
}

/// Instant after which the license is expired. None for lifetime or
/// never-activated licenses.
pub fn expires_at(license: &License) -> Option<i64> {
    if license.is_lifetime {
        return None;
    }
    license
        .activated_at
        .map(|activated| activated.saturating_add(license.duration))
}

fn is_time_expired(license: &License, now: i64) -> bool {
    expires_at(license).is_some_and(|expiry| now > expiry)
}

/// Effective state: paused, then time-expired, then the persisted status.
pub fn computed_status(license: &License, now: i64) -> EffectiveStatus {
    if license.paused_at.is_some() {
        return EffectiveStatus::Paused;
    }
    if is_time_expired(license, now) {
        return EffectiveStatus::Expired;
    }
    match license.status {
        LicenseStatus::Unused => EffectiveStatus::Unused,
        LicenseStatus::Active => EffectiveStatus::Active,
        LicenseStatus::Expired => EffectiveStatus::Expired,
    }
}

/// Whether the license is expired either on record or by the clock.
pub fn is_expired(license: &License, now: i64) -> bool {
    license.status == LicenseStatus::Expired || is_time_expired(license, now)
}

/// Remaining validity at `now`.
///
/// Never-activated licenses report their full duration. A paused license is
/// measured against `paused_at`, so the value does not shrink while paused.
pub fn time_left(license: &License, now: i64) -> TimeLeft {
    if license.status == LicenseStatus::Expired {
        return TimeLeft::Seconds(0);
    }
    if license.is_lifetime {
        return TimeLeft::Unbounded;
    }
    let Some(expiry) = expires_at(license) else {
        return TimeLeft::Seconds(license.duration.max(0));
    };
    let reference = license.paused_at.map_or(now, |paused| paused.min(now));
    TimeLeft::Seconds(expiry.saturating_sub(reference).max(0))
}

/// Human-readable duration, e.g. `1h 30m`, or `Lifetime`.
pub fn duration_human(license: &License) -> String {
    if license.is_lifetime {
        return LIFETIME_LABEL.to_string();
    }
    format_seconds(license.duration)
}

fn format_seconds(seconds: i64) -> String {
    let secs = u64::try_from(seconds).unwrap_or(0);
    humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

// ============ Administrative transitions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("License can only be paused while active (currently {})", .0.as_ref())]
    NotPausable(EffectiveStatus),

    #[error("License is not paused")]
    NotPaused,

    #[error("seconds must be at least 1")]
    NonPositiveSeconds,
}

/// Freeze the license clock. Only an effectively active license can be
/// paused; an already paused one is rejected so `paused_at` is never moved.
pub fn pause(license: &License, now: i64) -> Result<LicenseUpdate, TransitionError> {
    match computed_status(license, now) {
        EffectiveStatus::Active => Ok(LicenseUpdate {
            paused_at: Some(Some(now)),
            ..Default::default()
        }),
        other => Err(TransitionError::NotPausable(other)),
    }
}

/// Resume the clock, extending `duration` by the paused interval.
pub fn unpause(license: &License, now: i64) -> Result<LicenseUpdate, TransitionError> {
    let paused_at = license.paused_at.ok_or(TransitionError::NotPaused)?;
    // abs() guards against the wall clock stepping backwards
    let paused_for = now.saturating_sub(paused_at).saturating_abs();
    Ok(LicenseUpdate {
        paused_at: Some(None),
        duration: Some(license.duration.saturating_add(paused_for)),
        ..Default::default()
    })
}

pub fn add_time(license: &License, seconds: i64) -> Result<LicenseUpdate, TransitionError> {
    if seconds < 1 {
        return Err(TransitionError::NonPositiveSeconds);
    }
    Ok(LicenseUpdate {
        duration: Some(license.duration.saturating_add(seconds)),
        ..Default::default()
    })
}

/// Unbind the hardware id; the next check binds whatever id it carries.
pub fn reset_hwid() -> LicenseUpdate {
    LicenseUpdate {
        hwid: Some(None),
        ..Default::default()
    }
}
