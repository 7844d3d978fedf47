use rusqlite::Connection;

/// Initialize the database schema
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Products (owned by a single user, identified by the auth token's subject)
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',  -- JSON array, insertion order
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_products_owner ON products(owner_id);

        -- Licenses. No foreign key on product_id: deleting a product leaves
        -- its licenses in place, and ownership checks fail closed for them.
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            license_key TEXT NOT NULL,  -- encrypted, base64
            expiry_date INTEGER NOT NULL,
            auto_renew INTEGER NOT NULL DEFAULT 0,
            usage_limits TEXT,
            status TEXT NOT NULL DEFAULT 'Active' CHECK (status IN ('Active', 'Expired', 'Renewed')),
            notes TEXT,
            client_project TEXT,
            monthly_cost REAL NOT NULL DEFAULT 0,
            annual_cost REAL NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_product ON licenses(product_id);
        CREATE INDEX IF NOT EXISTS idx_licenses_status ON licenses(status);

        -- Documents attached to a license (append-only)
        CREATE TABLE IF NOT EXISTS license_documents (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            license_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            storage_key TEXT NOT NULL,
            url TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_license_documents_license ON license_documents(license_id);
        "#,
    )
}
