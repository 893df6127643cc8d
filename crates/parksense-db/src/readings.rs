//! Insert operations for the `sensor_readings` table.
//!
//! The ingestion hot path writes one reading at a time through
//! [`insert_reading`]. [`insert_readings`] writes a batch in a single
//! transaction for bulk loaders and replay tools.

use parksense_types::SensorReading;
use rusqlite::{params, Connection};

use crate::error::DbError;

const INSERT_SQL: &str = "INSERT INTO sensor_readings
        (sensor_type, sensor_instance_id, value, unit, timestamp)
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// Writes a single reading and returns its row ID.
///
/// # Errors
///
/// Returns `DbError::Database` on SQL failure.
pub fn insert_reading(conn: &Connection, reading: &SensorReading) -> Result<i64, DbError> {
    conn.execute(
        INSERT_SQL,
        params![
            reading.sensor_type,
            reading.sensor_instance_id,
            reading.value,
            reading.unit,
            reading.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes a batch of readings atomically.
///
/// Either every reading is stored or none is. Returns the number of rows
/// written.
///
/// # Errors
///
/// Returns `DbError::Database` on SQL failure; the transaction is rolled
/// back.
pub fn insert_readings(conn: &Connection, readings: &[SensorReading]) -> Result<usize, DbError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare_cached(INSERT_SQL)?;
        for reading in readings {
            stmt.execute(params![
                reading.sensor_type,
                reading.sensor_instance_id,
                reading.value,
                reading.unit,
                reading.timestamp.to_rfc3339(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(readings.len())
}

/// Returns the number of stored readings, optionally for one sensor.
///
/// # Errors
///
/// Returns `DbError::Database` on SQL failure.
pub fn count_readings(conn: &Connection, sensor_instance_id: Option<&str>) -> Result<i64, DbError> {
    let count = match sensor_instance_id {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM sensor_readings WHERE sensor_instance_id = ?1",
            [id],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?,
    };
    Ok(count)
}
