//! Schema versioning for the `SQLite` key-value store.
//!
//! The applied version lives in the `metadata` table. Each pending step from
//! [`MIGRATIONS`] runs in its own transaction together with the version bump.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, MIGRATIONS};

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// The newest schema version this build understands.
#[must_use]
pub fn current_version() -> i32 {
    MIGRATIONS.last().map_or(0, |(version, _)| *version)
}

/// Bring the schema up to [`current_version`].
///
/// # Errors
///
/// Returns [`Error::DatabaseMigration`] if the file was written by a newer
/// schema or holds an unreadable version, or a query error if a step fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let applied = schema_version(conn)?;
    let target = current_version();
    if applied > target {
        return Err(Error::DatabaseMigration {
            message: format!("database schema v{applied} is newer than supported v{target}"),
        });
    }

    for (version, statements) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        let tx = conn.unchecked_transaction()?;
        for statement in *statements {
            tx.execute(statement, [])?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (VERSION_KEY, version.to_string()),
        )?;
        tx.commit()?;
        info!(version, "Applied registry schema migration");
    }

    Ok(())
}

/// The applied schema version, 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    value.map_or(Ok(0), |v| {
        v.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {v}"),
        })
    })
}
