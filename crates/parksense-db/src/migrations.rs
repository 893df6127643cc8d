//! Embedded schema migrations.
//!
//! The schema version lives in SQLite's `user_version` header field. Each
//! migration `n` (1-based position in [`MIGRATIONS`]) runs in its own
//! transaction together with the bump to `user_version = n`, so a failed
//! step leaves both the schema and the version untouched.

use rusqlite::Connection;
use thiserror::Error;

/// Ordered schema steps. Append only; never edit a shipped entry.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_sensor_readings",
    include_str!("migrations/001_sensor_readings.sql"),
)];

#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration's SQL failed; nothing from that step was kept.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    /// Reading `user_version` failed.
    #[error("failed to read schema version: {0}")]
    StateQuery(rusqlite::Error),

    /// The database was written by a newer build.
    #[error("schema version {found} is newer than the {known} migrations this build knows")]
    UnknownVersion { found: usize, known: usize },
}

/// Brings the schema up to date. Returns how many steps ran.
///
/// # Errors
///
/// Returns `MigrationError` when a step fails or the store is from a newer
/// build.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, steps: &[(&str, &str)]) -> Result<usize, MigrationError> {
    let current: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(MigrationError::StateQuery)?;
    let current = usize::try_from(current.max(0)).unwrap_or(usize::MAX);

    if current > steps.len() {
        return Err(MigrationError::UnknownVersion {
            found: current,
            known: steps.len(),
        });
    }

    for (index, (name, sql)) in steps.iter().enumerate().skip(current) {
        let version = index + 1;
        tracing::info!(migration = *name, version, "applying migration");

        let failed = |source| MigrationError::ExecutionFailed {
            name: name.to_string(),
            source,
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.pragma_update(None, "user_version", version as i64)
            .map_err(failed)?;
        tx.commit().map_err(failed)?;
    }

    Ok(steps.len() - current)
}
