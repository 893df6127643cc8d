//! Persistence sink for the ParkSense pipeline.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the reading insert helpers used by the
//! ingestion worker.
//!
//! Migrations are compiled into the binary via `include_str!` so the schema
//! always ships with the code that writes to it.

mod error;
mod migrations;
mod pool;
mod readings;

pub use error::DbError;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, IN_MEMORY};
pub use readings::{count_readings, insert_reading, insert_readings};
