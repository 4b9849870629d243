//! SQLite schema definition.

/// Complete database schema for the lab core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS lab_tests (
    test_code TEXT PRIMARY KEY,
    test_name TEXT NOT NULL,
    category TEXT NOT NULL,
    price TEXT NOT NULL,                          -- decimal text
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS test_parameters (
    parameter_id TEXT PRIMARY KEY,
    test_code TEXT NOT NULL REFERENCES lab_tests(test_code) ON DELETE CASCADE,
    parameter_name TEXT NOT NULL,
    unit TEXT,
    normal_range TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_parameters_test ON test_parameters(test_code, sort_order);

CREATE TABLE IF NOT EXISTS consumables (
    consumable_code TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price TEXT NOT NULL,                          -- decimal text
    unit TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Doctor Directory
-- ============================================================================

CREATE TABLE IF NOT EXISTS doctors (
    doctor_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    qualifications TEXT NOT NULL DEFAULT '',
    designation TEXT NOT NULL DEFAULT '',
    workplace TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_doctors_name ON doctors(name);

-- ============================================================================
-- Invoices
-- ============================================================================

-- Invoice number counter (single row, advanced inside the creation transaction)
CREATE TABLE IF NOT EXISTS invoice_sequence (
    name TEXT PRIMARY KEY,
    last_value INTEGER NOT NULL DEFAULT 0 CHECK (last_value >= 0)
);

INSERT OR IGNORE INTO invoice_sequence (name, last_value) VALUES ('invoice', 0);

CREATE TABLE IF NOT EXISTS invoices (
    invoice_id TEXT PRIMARY KEY,
    invoice_no TEXT NOT NULL UNIQUE,
    sequence INTEGER NOT NULL UNIQUE,
    patient_name TEXT NOT NULL,
    patient_age TEXT NOT NULL,
    patient_gender TEXT NOT NULL,
    patient_contact_no TEXT NOT NULL,
    referred_by TEXT NOT NULL,                    -- free text, not a doctor reference
    delivery_date TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    discount_amount TEXT NOT NULL,
    amount_paid TEXT NOT NULL,
    due TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_invoices_created_at ON invoices(created_at);

CREATE TABLE IF NOT EXISTS line_items (
    line_item_id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_id TEXT NOT NULL REFERENCES invoices(invoice_id) ON DELETE CASCADE,
    item_kind TEXT NOT NULL CHECK (item_kind IN ('test', 'consumable')),
    item_code TEXT NOT NULL,
    item_name TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 1),
    unit_price TEXT NOT NULL,                     -- frozen at invoice creation
    UNIQUE (invoice_id, item_kind, item_code)
);

CREATE INDEX IF NOT EXISTS idx_line_items_code ON line_items(item_kind, item_code);

-- Line items are snapshots; they are never rewritten
CREATE TRIGGER IF NOT EXISTS line_items_immutable BEFORE UPDATE ON line_items
BEGIN
    SELECT RAISE(ABORT, 'Line items are immutable');
END;

-- ============================================================================
-- Reports
-- ============================================================================

CREATE TABLE IF NOT EXISTS reports (
    report_id TEXT PRIMARY KEY,
    invoice_id TEXT NOT NULL REFERENCES invoices(invoice_id) ON DELETE CASCADE,
    test_code TEXT NOT NULL,
    test_name TEXT NOT NULL,
    doctor_id TEXT REFERENCES doctors(doctor_id),
    report_date TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending', 'completed')),
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (invoice_id, test_code)
);

CREATE INDEX IF NOT EXISTS idx_reports_doctor ON reports(doctor_id);

CREATE TABLE IF NOT EXISTS report_results (
    report_id TEXT NOT NULL REFERENCES reports(report_id) ON DELETE CASCADE,
    parameter_id TEXT NOT NULL,
    parameter_name TEXT NOT NULL,                 -- snapshot
    result_value TEXT NOT NULL CHECK (length(trim(result_value)) > 0),
    unit TEXT,                                    -- snapshot
    normal_range TEXT,                            -- snapshot
    remark TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (report_id, parameter_id)
);
"#;
