//! Time source for record timestamps.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies Unix epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Wall clock. Reads before the epoch clamp to `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Deterministic clock that advances by `step_ms` after every read.
///
/// Clones share the same cursor, so a test can keep a handle while the
/// service owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    cursor: Rc<Cell<i64>>,
    step_ms: i64,
}

impl ManualClock {
    pub fn new(start_ms: i64, step_ms: i64) -> Self {
        Self {
            cursor: Rc::new(Cell::new(start_ms)),
            step_ms,
        }
    }

    /// Moves the cursor without consuming a reading.
    pub fn set(&self, now_ms: i64) {
        self.cursor.set(now_ms);
    }

    pub fn peek(&self) -> i64 {
        self.cursor.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        let now = self.cursor.get();
        self.cursor.set(now.saturating_add(self.step_ms));
        now
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, SystemClock};

    #[test]
    fn manual_clock_advances_per_read_and_shares_cursor() {
        let clock = ManualClock::new(100, 5);
        let handle = clock.clone();
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(handle.now_ms(), 105);
        assert_eq!(clock.peek(), 110);
        handle.set(1);
        assert_eq!(clock.now_ms(), 1);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
