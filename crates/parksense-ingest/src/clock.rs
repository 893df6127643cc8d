//! Ingestion timestamps.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Hands out ingestion timestamps that never go backwards within a process,
/// even if the wall clock is stepped back.
#[derive(Debug, Default)]
pub struct IngestClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl IngestClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current wall-clock time, clamped to the last value handed out.
    pub fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    fn observe(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let stamp = match *last {
            Some(prev) if prev > wall => prev,
            _ => wall,
        };
        *last = Some(stamp);
        stamp
    }
}
