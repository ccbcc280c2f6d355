//! Tests for administrative transitions through the store.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use licensor::engine::{CheckOutcome, TimeLeft};
use licensor::error::AppError;

const MISSING_ID: &str = "lic_00000000000000000000000000000000";

/// An active license bound to TEST_HWID, activated at `activated_at`.
fn active_license(conn: &mut rusqlite::Connection, activated_at: i64) -> License {
    let product = create_test_product(conn, "Pro", "pro-app");
    let license = create_test_license(conn, &product.id, ONE_HOUR);
    set_license_times(
        conn,
        &license.id,
        LicenseStatus::Active,
        Some(TEST_HWID),
        Some(activated_at),
        None,
    );
    get_license(conn, &license.id)
}

#[test]
fn test_pause_then_unpause_extends_duration() {
    let mut conn = setup_test_db();
    let t0 = now();
    let license = active_license(&mut conn, t0);

    let paused = queries::pause_license(&mut conn, &license.id, t0 + 600).unwrap();
    assert_eq!(paused.license.paused_at, Some(t0 + 600));

    let resumed = queries::unpause_license(&mut conn, &license.id, t0 + 900).unwrap();
    assert_eq!(resumed.license.paused_at, None);
    assert_eq!(resumed.license.duration, ONE_HOUR + 300);
    assert_eq!(
        engine::time_left(&resumed.license, t0 + 900),
        TimeLeft::Seconds(3000)
    );
}

#[test]
fn test_paused_license_checks_report_paused() {
    let mut conn = setup_test_db();
    let t0 = now();
    let license = active_license(&mut conn, t0);
    queries::pause_license(&mut conn, &license.id, t0 + 10).unwrap();

    // Long past the original expiry: pause still wins
    let result = queries::check_license(
        &mut conn,
        &license.license_key,
        "pro-app",
        TEST_HWID,
        t0 + 10 * ONE_HOUR,
    )
    .unwrap();

    assert_eq!(result.outcome, CheckOutcome::Paused);
    assert_eq!(get_license(&conn, &license.id).status, LicenseStatus::Active);
}

#[test]
fn test_pause_twice_is_rejected_without_moving_timestamp() {
    let mut conn = setup_test_db();
    let t0 = now();
    let license = active_license(&mut conn, t0);
    queries::pause_license(&mut conn, &license.id, t0 + 10).unwrap();

    let again = queries::pause_license(&mut conn, &license.id, t0 + 20);

    assert!(matches!(again, Err(AppError::Conflict(_))));
    assert_eq!(get_license(&conn, &license.id).paused_at, Some(t0 + 10));
}

#[test]
fn test_pause_rejects_unused_and_expired() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "Pro", "pro-app");
    let unused = create_test_license(&mut conn, &product.id, ONE_HOUR);
    let stale = create_test_license(&mut conn, &product.id, ONE_HOUR);
    let t0 = now();
    set_license_times(
        &conn,
        &stale.id,
        LicenseStatus::Active,
        Some(TEST_HWID),
        Some(t0 - 2 * ONE_HOUR),
        None,
    );

    assert!(matches!(
        queries::pause_license(&mut conn, &unused.id, t0),
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        queries::pause_license(&mut conn, &stale.id, t0),
        Err(AppError::Conflict(_))
    ));
    assert_eq!(get_license(&conn, &stale.id).paused_at, None);
}

#[test]
fn test_unpause_without_pause_is_conflict() {
    let mut conn = setup_test_db();
    let license = active_license(&mut conn, now());

    assert!(matches!(
        queries::unpause_license(&mut conn, &license.id, now()),
        Err(AppError::Conflict(_))
    ));
}

#[test]
fn test_add_time_extends_expiry() {
    let mut conn = setup_test_db();
    let t0 = now();
    let license = active_license(&mut conn, t0 - 2 * ONE_HOUR);

    let updated = queries::add_license_time(&mut conn, &license.id, 2 * ONE_HOUR, t0).unwrap();
    assert_eq!(updated.license.duration, 3 * ONE_HOUR);

    let result =
        queries::check_license(&mut conn, &license.license_key, "pro-app", TEST_HWID, t0).unwrap();
    assert_eq!(result.outcome, CheckOutcome::Valid);
}

#[test]
fn test_override_revives_expired_license() {
    let mut conn = setup_test_db();
    let t0 = now();
    let license = active_license(&mut conn, t0);
    set_license_times(
        &conn,
        &license.id,
        LicenseStatus::Expired,
        Some(TEST_HWID),
        Some(t0),
        None,
    );

    let updated = queries::update_license(
        &mut conn,
        &license.id,
        &UpdateLicense {
            status: Some(LicenseStatus::Active),
            description: Some(Some("revived by support".to_string())),
        },
        t0 + 1,
    )
    .unwrap();

    assert_eq!(updated.license.status, LicenseStatus::Active);
    assert_eq!(updated.license.description.as_deref(), Some("revived by support"));
    let result =
        queries::check_license(&mut conn, &license.license_key, "pro-app", TEST_HWID, t0 + 2)
            .unwrap();
    assert_eq!(result.outcome, CheckOutcome::Valid);
}

#[test]
fn test_clearing_description() {
    let mut conn = setup_test_db();
    let license = active_license(&mut conn, now());
    queries::update_license(
        &mut conn,
        &license.id,
        &UpdateLicense {
            status: None,
            description: Some(Some("note".to_string())),
        },
        now(),
    )
    .unwrap();

    let cleared = queries::update_license(
        &mut conn,
        &license.id,
        &UpdateLicense {
            status: None,
            description: Some(None),
        },
        now(),
    )
    .unwrap();

    assert_eq!(cleared.license.description, None);
    assert_eq!(cleared.license.status, LicenseStatus::Active);
}

#[test]
fn test_operations_on_missing_license_are_not_found() {
    let mut conn = setup_test_db();
    let t = now();

    assert!(matches!(
        queries::pause_license(&mut conn, MISSING_ID, t),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        queries::unpause_license(&mut conn, MISSING_ID, t),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        queries::add_license_time(&mut conn, MISSING_ID, 60, t),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        queries::reset_license_hwid(&mut conn, MISSING_ID, t),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        queries::update_license(&mut conn, MISSING_ID, &UpdateLicense::default(), t),
        Err(AppError::NotFound(_))
    ));
    assert!(!queries::delete_license(&conn, MISSING_ID).unwrap());
}

#[test]
fn test_delete_is_immediate() {
    let mut conn = setup_test_db();
    let license = active_license(&mut conn, now());

    assert!(queries::delete_license(&conn, &license.id).unwrap());
    assert!(queries::get_license_by_id(&conn, &license.id).unwrap().is_none());
    let result =
        queries::check_license(&mut conn, &license.license_key, "pro-app", TEST_HWID, now())
            .unwrap();
    assert_eq!(result.outcome, CheckOutcome::Invalid);
}
