//! `SQLite` schema definitions for the key-value store.

/// Bookkeeping table holding the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Version 1: one row per storage key.
pub const CREATE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Version 2: last write time per key.
pub const ADD_ENTRIES_UPDATED_AT: &str = "ALTER TABLE entries ADD COLUMN updated_at TEXT";

/// Statements for each schema version, in ascending order.
pub const MIGRATIONS: &[(i32, &[&str])] = &[
    (1, &[CREATE_ENTRIES_TABLE]),
    (2, &[ADD_ENTRIES_UPDATED_AT]),
];
