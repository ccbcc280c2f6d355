//! Positional row mapping for products, licenses and check records.
//!
//! Each `*_COLS` constant fixes the column order its `FromRow` impl reads.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Read a TEXT column holding a strum-serialized enum.
/// A corrupt value surfaces as a database error instead of a panic.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// First row of `sql`, or None.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Every row of `sql`.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ Column lists ============

pub const PRODUCT_COLS: &str = "id, name, product_code, created_at, updated_at";

/// Product columns plus a license count; expects `products p`.
pub const PRODUCT_WITH_COUNT_COLS: &str = "p.id, p.name, p.product_code, p.created_at, p.updated_at, (SELECT COUNT(*) FROM licenses l WHERE l.product_id = p.id)";

pub const LICENSE_COLS: &str = "id, product_id, license_key, duration, is_lifetime, status, hwid, description, activated_at, paused_at, created_at, updated_at";

/// License columns joined with the owning product; expects `licenses l JOIN products p`.
pub const LICENSE_WITH_PRODUCT_COLS: &str = "l.id, l.product_id, l.license_key, l.duration, l.is_lifetime, l.status, l.hwid, l.description, l.activated_at, l.paused_at, l.created_at, l.updated_at, p.name, p.product_code";

pub const CHECK_RECORD_COLS: &str = "id, license_id, key_fingerprint, hwid_fingerprint, ip_address, user_agent, outcome, created_at";

// ============ Row mappings ============

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            product_code: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl FromRow for ProductWithLicenseCount {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProductWithLicenseCount {
            product: Product::from_row(row)?,
            license_count: row.get(5)?,
        })
    }
}

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            id: row.get(0)?,
            product_id: row.get(1)?,
            license_key: row.get(2)?,
            duration: row.get(3)?,
            is_lifetime: row.get::<_, i32>(4)? != 0,
            status: parse_enum(row, 5, "status")?,
            hwid: row.get(6)?,
            description: row.get(7)?,
            activated_at: row.get(8)?,
            paused_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for LicenseWithProduct {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LicenseWithProduct {
            license: License::from_row(row)?,
            product_name: row.get(12)?,
            product_code: row.get(13)?,
        })
    }
}

impl FromRow for CheckRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CheckRecord {
            id: row.get(0)?,
            license_id: row.get(1)?,
            key_fingerprint: row.get(2)?,
            hwid_fingerprint: row.get(3)?,
            ip_address: row.get(4)?,
            user_agent: row.get(5)?,
            outcome: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
