use rusqlite::Connection;

/// Initialize the main database schema (products and licenses)
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            product_code TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- status is the persisted state only; paused/time-expired are derived
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            license_key TEXT NOT NULL UNIQUE,
            duration INTEGER NOT NULL CHECK (duration >= 0),
            is_lifetime INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'unused' CHECK (status IN ('unused', 'active', 'expired')),
            hwid TEXT,
            description TEXT,
            activated_at INTEGER,
            paused_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_product ON licenses(product_id);
        CREATE INDEX IF NOT EXISTS idx_licenses_status ON licenses(status);
        "#,
    )
}

/// Initialize the check registry schema (separate database file)
pub fn init_registry_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Append-heavy: WAL keeps writers from blocking readers
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 1000;
        PRAGMA journal_size_limit = 67108864;

        -- No foreign key: licenses live in another file and may be deleted
        CREATE TABLE IF NOT EXISTS check_records (
            id TEXT PRIMARY KEY,
            license_id TEXT,
            key_fingerprint TEXT NOT NULL,
            hwid_fingerprint TEXT NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            outcome TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_check_records_license ON check_records(license_id, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_check_records_created ON check_records(created_at);
        "#,
    )
}
