//! Error types for reading persistence.

/// Errors that can occur while writing readings.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A database operation failed.
    #[error("reading store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be checked out.
    #[error("reading store pool error: {0}")]
    Pool(#[from] r2d2::Error),
}
