use chrono::Utc;
use rusqlite::{Connection, ErrorCode, ToSql, TransactionBehavior, params, types::Value};

use crate::engine::{self, CheckOutcome, LicenseUpdate, TransitionError};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::id::EntityType;
use crate::keygen;
use crate::models::*;

use super::from_row::{
    CHECK_RECORD_COLS, LICENSE_COLS, LICENSE_WITH_PRODUCT_COLS, PRODUCT_COLS,
    PRODUCT_WITH_COUNT_COLS, query_all, query_one,
};

const SECONDS_PER_DAY: i64 = 86400;

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// `UPDATE <table> SET ... WHERE id = ?` over only the columns that change.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    updated_at: Option<i64>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            updated_at: None,
        }
    }

    fn with_updated_at(mut self, at: i64) -> Self {
        self.updated_at = Some(at);
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// None writes NULL.
    fn set_nullable<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        self.set(column, value.map_or(Value::Null, Into::into))
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if let Some(at) = self.updated_at {
            self.fields.push(("updated_at", at.into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

/// Map a uniqueness violation to a 409, anything else to a database error.
fn conflict_on_constraint(err: rusqlite::Error, message: &str) -> AppError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            AppError::Conflict(message.into())
        }
        _ => err.into(),
    }
}

fn trimmed_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let id = EntityType::Product.gen_id();
    let now = now();
    let name = input.name.trim();
    let product_code = input.product_code.trim();

    conn.execute(
        "INSERT INTO products (id, name, product_code, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![&id, name, product_code, now],
    )
    .map_err(|e| conflict_on_constraint(e, msg::PRODUCT_CODE_TAKEN))?;

    Ok(Product {
        id,
        name: name.to_string(),
        product_code: product_code.to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

pub fn get_product_with_count(
    conn: &Connection,
    id: &str,
) -> Result<Option<ProductWithLicenseCount>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM products p WHERE p.id = ?1",
            PRODUCT_WITH_COUNT_COLS
        ),
        &[&id],
    )
}

pub fn count_products(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
        .map_err(Into::into)
}

pub fn list_products_paginated(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ProductWithLicenseCount>, i64)> {
    let total = count_products(conn)?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM products p ORDER BY p.created_at DESC, p.id LIMIT ?1 OFFSET ?2",
            PRODUCT_WITH_COUNT_COLS
        ),
        params![limit, offset],
    )?;
    Ok((items, total))
}

// ============ Licenses ============

/// Generate `input.count` licenses in one transaction. Either every license
/// is created or none is.
pub fn create_licenses(
    conn: &mut Connection,
    input: &CreateLicenses,
    now: i64,
) -> Result<Vec<License>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    get_product_by_id(&tx, &input.product_id)?.or_not_found(msg::PRODUCT_NOT_FOUND)?;

    let description = trimmed_description(input.description.as_deref());
    let mut licenses = Vec::with_capacity(input.count as usize);
    {
        let mut stmt = tx.prepare(
            "INSERT INTO licenses (id, product_id, license_key, duration, is_lifetime, status, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'unused', ?6, ?7, ?7)",
        )?;
        for _ in 0..input.count {
            let id = EntityType::License.gen_id();
            let license_key = keygen::generate_license_key()
                .map_err(|e| AppError::Internal(e.to_string()))?;
            stmt.execute(params![
                &id,
                &input.product_id,
                &license_key,
                input.duration,
                input.is_lifetime,
                &description,
                now
            ])?;
            licenses.push(License {
                id,
                product_id: input.product_id.clone(),
                license_key,
                duration: input.duration,
                is_lifetime: input.is_lifetime,
                status: LicenseStatus::Unused,
                hwid: None,
                description: description.clone(),
                activated_at: None,
                paused_at: None,
                created_at: now,
                updated_at: now,
            });
        }
    }
    tx.commit()?;

    Ok(licenses)
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        &[&id],
    )
}

pub fn get_license_with_product(
    conn: &Connection,
    id: &str,
) -> Result<Option<LicenseWithProduct>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM licenses l JOIN products p ON p.id = l.product_id WHERE l.id = ?1",
            LICENSE_WITH_PRODUCT_COLS
        ),
        &[&id],
    )
}

/// Look up a license by key, scoped to a product code. A key that exists
/// under another product is indistinguishable from an unknown key.
pub fn find_license_for_check(
    conn: &Connection,
    license_key: &str,
    product_code: &str,
) -> Result<Option<LicenseWithProduct>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM licenses l JOIN products p ON p.id = l.product_id
             WHERE l.license_key = ?1 AND p.product_code = ?2",
            LICENSE_WITH_PRODUCT_COLS
        ),
        &[&license_key, &product_code],
    )
}

pub fn list_licenses_paginated(
    conn: &Connection,
    filter: &LicenseFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<LicenseWithProduct>, i64)> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(ref product_id) = filter.product_id {
        conditions.push("l.product_id = ?");
        values.push(product_id.clone().into());
    }
    if let Some(status) = filter.status {
        conditions.push("l.status = ?");
        values.push(status.as_ref().to_string().into());
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM licenses l {}", where_clause),
        rusqlite::params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    values.push(limit.into());
    values.push(offset.into());
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses l JOIN products p ON p.id = l.product_id {}
             ORDER BY l.created_at DESC, l.id LIMIT ? OFFSET ?",
            LICENSE_WITH_PRODUCT_COLS, where_clause
        ),
        &params,
    )?;
    Ok((items, total))
}

fn write_license_update(
    conn: &Connection,
    id: &str,
    update: &LicenseUpdate,
    now: i64,
) -> Result<bool> {
    let mut builder = UpdateBuilder::new("licenses", id).with_updated_at(now);
    if let Some(status) = update.status {
        builder = builder.set("status", status.as_ref().to_string());
    }
    if let Some(ref hwid) = update.hwid {
        builder = builder.set_nullable("hwid", hwid.clone());
    }
    if let Some(activated_at) = update.activated_at {
        builder = builder.set("activated_at", activated_at);
    }
    if let Some(paused_at) = update.paused_at {
        builder = builder.set_nullable("paused_at", paused_at);
    }
    if let Some(duration) = update.duration {
        builder = builder.set("duration", duration);
    }
    builder.execute(conn)
}

/// Outcome of a check, with the license as it stands after any write-back.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub outcome: CheckOutcome,
    /// None for `Invalid`.
    pub license: Option<LicenseWithProduct>,
}

/// Run one license check: lookup, evaluate, write back, commit.
///
/// The whole read-modify-write runs under `BEGIN IMMEDIATE`, which takes the
/// database write lock up front. Two concurrent first checks of the same
/// unused key are therefore serialized: exactly one sees `unused` and
/// activates, the other sees the active record.
pub fn check_license(
    conn: &mut Connection,
    license_key: &str,
    product_code: &str,
    hwid: &str,
    now: i64,
) -> Result<CheckResult> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(mut found) = find_license_for_check(&tx, license_key, product_code)? else {
        return Ok(CheckResult {
            outcome: CheckOutcome::Invalid,
            license: None,
        });
    };

    let decision = engine::evaluate(&found.license, hwid, now);
    if let Some(ref update) = decision.update {
        write_license_update(&tx, &found.license.id, update, now)?;
        update.apply_to(&mut found.license);
        found.license.updated_at = now;
    }
    tx.commit()?;

    Ok(CheckResult {
        outcome: decision.outcome,
        license: Some(found),
    })
}

/// Apply an administrative transition under the same write lock as checks.
fn transition_license<F>(
    conn: &mut Connection,
    id: &str,
    now: i64,
    transition: F,
) -> Result<LicenseWithProduct>
where
    F: FnOnce(&License) -> std::result::Result<LicenseUpdate, TransitionError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = get_license_by_id(&tx, id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;
    let update = transition(&current)?;
    write_license_update(&tx, id, &update, now)?;
    let updated = get_license_with_product(&tx, id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;
    tx.commit()?;
    Ok(updated)
}

pub fn pause_license(conn: &mut Connection, id: &str, now: i64) -> Result<LicenseWithProduct> {
    transition_license(conn, id, now, |license| engine::pause(license, now))
}

pub fn unpause_license(conn: &mut Connection, id: &str, now: i64) -> Result<LicenseWithProduct> {
    transition_license(conn, id, now, |license| engine::unpause(license, now))
}

pub fn add_license_time(
    conn: &mut Connection,
    id: &str,
    seconds: i64,
    now: i64,
) -> Result<LicenseWithProduct> {
    transition_license(conn, id, now, |license| engine::add_time(license, seconds))
}

pub fn reset_license_hwid(
    conn: &mut Connection,
    id: &str,
    now: i64,
) -> Result<LicenseWithProduct> {
    transition_license(conn, id, now, |_| Ok(engine::reset_hwid()))
}

/// Operator override of status and/or description. Skips the state machine.
pub fn update_license(
    conn: &mut Connection,
    id: &str,
    input: &UpdateLicense,
    now: i64,
) -> Result<LicenseWithProduct> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    get_license_by_id(&tx, id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;

    let mut builder = UpdateBuilder::new("licenses", id).with_updated_at(now);
    if let Some(status) = input.status {
        builder = builder.set("status", status.as_ref().to_string());
    }
    if let Some(ref description) = input.description {
        builder = builder.set_nullable("description", trimmed_description(description.as_deref()));
    }
    builder.execute(&tx)?;

    let updated = get_license_with_product(&tx, id)?.or_not_found(msg::LICENSE_NOT_FOUND)?;
    tx.commit()?;
    Ok(updated)
}

/// Hard delete. Returns false if no license had this id.
pub fn delete_license(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM licenses WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ============ Check registry ============

/// Fields of a check registry entry before insertion.
#[derive(Debug, Clone, Copy)]
pub struct NewCheckRecord<'a> {
    pub license_id: Option<&'a str>,
    pub key_fingerprint: &'a str,
    pub hwid_fingerprint: &'a str,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub outcome: &'a str,
    /// Defaults to now.
    pub created_at: Option<i64>,
}

pub fn create_check_record(
    conn: &Connection,
    enabled: bool,
    input: &NewCheckRecord,
) -> Result<CheckRecord> {
    let record = CheckRecord {
        id: EntityType::CheckRecord.gen_id(),
        license_id: input.license_id.map(String::from),
        key_fingerprint: input.key_fingerprint.to_string(),
        hwid_fingerprint: input.hwid_fingerprint.to_string(),
        ip_address: input.ip_address.map(String::from),
        user_agent: input.user_agent.map(String::from),
        outcome: input.outcome.to_string(),
        created_at: input.created_at.unwrap_or_else(now),
    };

    // Skip database insert if the registry is disabled
    if !enabled {
        return Ok(record);
    }

    conn.execute(
        "INSERT INTO check_records (id, license_id, key_fingerprint, hwid_fingerprint, ip_address, user_agent, outcome, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &record.id,
            &record.license_id,
            &record.key_fingerprint,
            &record.hwid_fingerprint,
            &record.ip_address,
            &record.user_agent,
            &record.outcome,
            record.created_at
        ],
    )?;

    Ok(record)
}

pub fn list_check_records_for_license(
    conn: &Connection,
    license_id: &str,
    limit: i64,
    offset: i64,
) -> Result<(Vec<CheckRecord>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM check_records WHERE license_id = ?1",
        params![license_id],
        |row| row.get(0),
    )?;
    let items = query_all(
        conn,
        &format!(
            "SELECT {} FROM check_records WHERE license_id = ?1
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
            CHECK_RECORD_COLS
        ),
        params![license_id, limit, offset],
    )?;
    Ok((items, total))
}

/// Delete check records older than `retention_days`. 0 keeps everything, as
/// does a horizon reaching past the start of the epoch.
pub fn purge_old_check_records(conn: &Connection, retention_days: i64) -> Result<usize> {
    if retention_days <= 0 {
        return Ok(0);
    }
    let Some(cutoff) = retention_days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|window| now().checked_sub(window))
        .filter(|cutoff| *cutoff > 0)
    else {
        return Ok(0);
    };
    let deleted = conn.execute(
        "DELETE FROM check_records WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
