use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Hands out strictly increasing ids that track wall-clock milliseconds.
///
/// Two calls within the same millisecond still get distinct ids, which a
/// bare timestamp cannot promise.
#[derive(Debug)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub fn new(floor: i64) -> Self {
        Self {
            last: AtomicI64::new(floor),
        }
    }

    /// Next id, also kept above `taken`, the highest id the target
    /// collection already holds. Records created elsewhere (the generic
    /// REST surface assigns max + 1) are therefore never reused.
    pub fn next_above(&self, taken: i64) -> i64 {
        let now = Utc::now().timestamp_millis();
        let bump = |prev: i64| prev.saturating_add(1).max(now).max(taken.saturating_add(1));

        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(bump(prev)))
            .unwrap_or_else(|prev| prev);

        bump(previous)
    }
}
