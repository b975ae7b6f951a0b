//! Time-derived history identifiers.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Hands out millisecond-timestamp ids that never repeat within a process.
///
/// Two requests in the same millisecond get consecutive values instead of
/// colliding.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self { last: AtomicI64::new(0) }
    }

    /// Next unique id, rendered as a decimal string.
    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev.saturating_add(1));
            match self.last.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Ensures future ids sort after `id` (used after loading persisted history).
    pub fn observe(&self, id: &str) {
        if let Ok(value) = id.parse::<i64>() {
            self.last.fetch_max(value, Ordering::AcqRel);
        }
    }
}
