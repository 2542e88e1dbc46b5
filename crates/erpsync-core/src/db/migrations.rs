//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 4;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }
    if version < 4 {
        migrate_v4(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Run `statements` atomically and log the new version
fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    for stmt in statements {
        if let Err(e) = conn.execute_batch(stmt) {
            conn.execute_batch("ROLLBACK").ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version]) {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute_batch("COMMIT") {
        conn.execute_batch("ROLLBACK").ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: reference data, partners and products
fn migrate_v1(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        "CREATE TABLE IF NOT EXISTS journals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            company_id INTEGER,
            document_type_code TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_journals_code ON journals(code)",
        "CREATE TABLE IF NOT EXISTS currencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )",
        "CREATE TABLE IF NOT EXISTS payment_terms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS shops (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS uoms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS taxes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0
        )",
        "CREATE TABLE IF NOT EXISTS identification_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            vat_code TEXT
        )",
        "CREATE TABLE IF NOT EXISTS countries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            code TEXT
        )",
        "CREATE TABLE IF NOT EXISTS country_states (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            country_id INTEGER REFERENCES countries(id)
        )",
        "CREATE TABLE IF NOT EXISTS cities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            state_id INTEGER REFERENCES country_states(id)
        )",
        "CREATE TABLE IF NOT EXISTS districts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            city_id INTEGER REFERENCES cities(id)
        )",
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS product_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES product_categories(id)
        )",
        // import_id is not unique; dedup happens in the sync planner
        "CREATE TABLE IF NOT EXISTS partners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            vat TEXT,
            street TEXT,
            zip TEXT,
            company_type TEXT NOT NULL,
            identification_type_id INTEGER,
            country_id INTEGER,
            state_id INTEGER,
            city_id INTEGER,
            district_id INTEGER,
            import_id INTEGER,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_partners_import_id ON partners(import_id)",
        "CREATE INDEX IF NOT EXISTS idx_partners_vat ON partners(vat)",
        "CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            default_code TEXT,
            barcode TEXT,
            minicode TEXT,
            list_price REAL NOT NULL DEFAULT 0,
            standard_price REAL NOT NULL DEFAULT 0,
            detailed_type TEXT NOT NULL,
            tracking TEXT NOT NULL,
            categ_id INTEGER REFERENCES product_categories(id),
            company_id INTEGER,
            description_sale TEXT,
            model TEXT,
            technology TEXT,
            import_id INTEGER,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_products_import_id ON products(import_id)",
        "CREATE INDEX IF NOT EXISTS idx_products_name ON products(name)",
        "CREATE INDEX IF NOT EXISTS idx_products_default_code ON products(default_code)",
        "CREATE TABLE IF NOT EXISTS product_taxes (
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            tax_id INTEGER NOT NULL,
            PRIMARY KEY (product_id, tax_id)
        )",
    ];
    apply(conn, 1, &statements)
}

/// Migration to version 2: accounting moves, electronic documents and the sync log
fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS moves (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            move_type TEXT NOT NULL,
            invoice_date TEXT,
            invoice_date_due TEXT,
            date TEXT,
            journal_id INTEGER NOT NULL REFERENCES journals(id),
            partner_id INTEGER,
            currency_id INTEGER NOT NULL,
            payment_term_id INTEGER,
            shop_id INTEGER NOT NULL,
            document_type_code TEXT,
            datetime_invoice TEXT,
            state TEXT NOT NULL,
            payment_state TEXT NOT NULL,
            amount_total REAL NOT NULL DEFAULT 0,
            amount_residual REAL NOT NULL DEFAULT 0,
            reversal_type_code TEXT,
            origin_move_id INTEGER,
            ref TEXT,
            import_id INTEGER,
            edi_request_id INTEGER,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_moves_import_id ON moves(move_type, import_id)",
        "CREATE INDEX IF NOT EXISTS idx_moves_name ON moves(move_type, name)",
        "CREATE TABLE IF NOT EXISTS move_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            move_id INTEGER NOT NULL REFERENCES moves(id) ON DELETE CASCADE,
            product_id INTEGER,
            uom_id INTEGER NOT NULL,
            name TEXT,
            quantity REAL NOT NULL,
            price_unit REAL NOT NULL,
            discount REAL NOT NULL DEFAULT 0,
            price_subtotal REAL NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_move_lines_move ON move_lines(move_id)",
        "CREATE TABLE IF NOT EXISTS move_line_taxes (
            line_id INTEGER NOT NULL REFERENCES move_lines(id) ON DELETE CASCADE,
            tax_id INTEGER NOT NULL,
            PRIMARY KEY (line_id, tax_id)
        )",
        "CREATE TABLE IF NOT EXISTS edi_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            move_id INTEGER NOT NULL REFERENCES moves(id) ON DELETE CASCADE,
            ose_accepted INTEGER NOT NULL DEFAULT 0,
            sunat_accepted INTEGER NOT NULL DEFAULT 0,
            sunat_canceled INTEGER NOT NULL DEFAULT 0,
            xml_generated INTEGER NOT NULL DEFAULT 0,
            xml_attachment_id INTEGER,
            cdr_attachment_id INTEGER,
            digest_value TEXT
        )",
        "CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            res_model TEXT NOT NULL,
            res_id INTEGER NOT NULL,
            datas TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_attachments_res ON attachments(res_model, res_id)",
        "CREATE TABLE IF NOT EXISTS sync_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            connection TEXT NOT NULL,
            res_id INTEGER,
            res_model TEXT NOT NULL,
            name TEXT NOT NULL,
            date_issue TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            json_data TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_log_created_at ON sync_log(created_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_sync_log_run ON sync_log(run_id)",
    ];
    apply(conn, 2, &statements)
}

/// Migration to version 3: serial lots and stock quantities
fn migrate_v3(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS lots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            product_id INTEGER NOT NULL REFERENCES products(id),
            company_id INTEGER,
            location_id INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_lots_product_name ON lots(product_id, name)",
        "CREATE TABLE IF NOT EXISTS stock_quants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id),
            location_id INTEGER NOT NULL,
            lot_id INTEGER REFERENCES lots(id),
            quantity REAL NOT NULL,
            reserved_quantity REAL NOT NULL DEFAULT 0,
            company_id INTEGER,
            inventory_date TEXT
        )",
        "CREATE INDEX IF NOT EXISTS idx_stock_quants_product ON stock_quants(product_id, location_id)",
    ];
    apply(conn, 3, &statements)
}

/// Migration to version 4: attributes, variants and website categories.
///
/// A variant is a `products` row whose `template_id` points at its template.
fn migrate_v4(conn: &Connection) -> Result<()> {
    let statements = [
        "ALTER TABLE products ADD COLUMN template_id INTEGER REFERENCES products(id)",
        "ALTER TABLE products ADD COLUMN id_articulo TEXT",
        "ALTER TABLE products ADD COLUMN is_published INTEGER NOT NULL DEFAULT 0",
        "CREATE INDEX IF NOT EXISTS idx_products_template ON products(template_id)",
        "CREATE TABLE IF NOT EXISTS product_attributes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )",
        "CREATE TABLE IF NOT EXISTS product_attribute_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            attribute_id INTEGER NOT NULL REFERENCES product_attributes(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            UNIQUE (attribute_id, name)
        )",
        "CREATE TABLE IF NOT EXISTS product_variant_values (
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            value_id INTEGER NOT NULL REFERENCES product_attribute_values(id),
            PRIMARY KEY (product_id, value_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_product_variant_values_value ON product_variant_values(value_id)",
        "CREATE TABLE IF NOT EXISTS public_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER REFERENCES public_categories(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_public_categories_name ON public_categories(name)",
        "CREATE TABLE IF NOT EXISTS product_public_categories (
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            categ_id INTEGER NOT NULL REFERENCES public_categories(id),
            PRIMARY KEY (product_id, categ_id)
        )",
    ];
    apply(conn, CURRENT_VERSION, &statements)
}
