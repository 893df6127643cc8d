//! Reading store connection pool.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

/// Path that selects a process-private in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections. Ignored for
    /// [`IN_MEMORY`], which always uses a single connection.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create reading store pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Opens the reading store.
///
/// File-backed stores run in WAL mode so the HTTP side can read while the
/// ingestion worker writes. An [`IN_MEMORY`] store is capped at one
/// connection: every SQLite in-memory connection is its own database, and
/// readers must see what the worker wrote.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the first connection cannot be opened
/// or initialised.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let busy_timeout_ms = settings.busy_timeout_ms;
    let (manager, builder) = if db_path == IN_MEMORY {
        // The one connection is the database; reaping it would drop every table.
        let builder = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None);
        (SqliteConnectionManager::memory(), builder)
    } else {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        (
            SqliteConnectionManager::file(db_path).with_flags(flags),
            Pool::builder().max_size(settings.pool_max_size.max(1)),
        )
    };

    let manager = manager.with_init(move |conn| init_connection(conn, busy_timeout_ms));
    let pool = builder.build(manager)?;
    Ok(pool)
}

fn init_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if journal_mode != "wal" && journal_mode != "memory" {
        tracing::warn!(journal_mode = %journal_mode, "reading store is not in WAL mode");
    }
    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}
