//! Time-based identifiers.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Mints `<prefix>_<unix_ms>` ids.
///
/// The millisecond part never repeats within one generator: a second id in
/// the same millisecond takes the next value instead.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: &'static str,
    last: AtomicI64,
}

impl IdGenerator {
    /// Create a generator for the given prefix.
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            last: AtomicI64::new(0),
        }
    }

    /// Mint the next id.
    pub fn next_id(&self) -> String {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&self, now_ms: i64) -> String {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return format!("{}_{}", self.prefix, candidate),
                Err(actual) => current = actual,
            }
        }
    }
}
