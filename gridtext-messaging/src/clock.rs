//! Game clock abstraction and message-age formatting.
//!
//! Texts are stamped with a logical game time rather than the wall
//! clock, so an in-game calendar can run ahead of (or behind) the real
//! one. The clock is an explicit capability handed to the store at
//! construction, not a process-global lookup, which keeps time fully
//! scriptable in tests.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of logical game time.
pub trait GameClock: Send + Sync {
    /// Current game time, in seconds since the epoch.
    fn now(&self) -> i64;
}

/// Wall-clock time, unshifted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl GameClock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Wall-clock time plus a fixed offset.
///
/// Lets the game calendar sit years away from the real one while still
/// advancing at real-time speed.
#[derive(Debug, Clone, Copy)]
pub struct OffsetClock {
    offset_secs: i64,
}

impl OffsetClock {
    pub fn new(offset_secs: i64) -> Self {
        Self { offset_secs }
    }
}

impl GameClock for OffsetClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp() + self.offset_secs
    }
}

/// Clock that only moves when told to. Meant for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_secs: i64) -> Self {
        Self {
            now: AtomicI64::new(start_secs),
        }
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, secs: i64) {
        self.now.store(secs, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl GameClock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

const DURATION_UNITS: &[(&str, i64)] = &[
    ("year", 365 * 24 * 3600),
    ("day", 24 * 3600),
    ("hour", 3600),
    ("minute", 60),
];

/// Format an elapsed duration the way a phone shows message age: the
/// two largest nonzero units, or "moments" for anything under a
/// minute.
///
/// ```
/// use gridtext_messaging::format_duration;
///
/// assert_eq!(format_duration(30), "moments");
/// assert_eq!(format_duration(3_720), "1 hour, 2 minutes");
/// ```
pub fn format_duration(secs: i64) -> String {
    let mut remaining = secs.max(0);
    let mut parts = Vec::new();
    for &(unit, span) in DURATION_UNITS {
        if parts.len() == 2 {
            break;
        }
        let count = remaining / span;
        if count > 0 {
            remaining -= count * span;
            let plural = if count == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", count, unit, plural));
        }
    }
    if parts.is_empty() {
        "moments".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now(), 100);

        clock.advance(50);
        assert_eq!(clock.now(), 150);

        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn test_offset_clock_shifts_system_time() {
        let base = SystemClock.now();
        let shifted = OffsetClock::new(3600).now();
        assert!(shifted - base >= 3600);
        assert!(shifted - base < 3610);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "moments");
        assert_eq!(format_duration(59), "moments");
        assert_eq!(format_duration(60), "1 minute");
        assert_eq!(format_duration(120), "2 minutes");
        assert_eq!(format_duration(3600), "1 hour");
        assert_eq!(format_duration(3660), "1 hour, 1 minute");
        assert_eq!(format_duration(90_000), "1 day, 1 hour");
        assert_eq!(format_duration(86_400 * 365), "1 year");
        assert_eq!(format_duration(86_400 * 366 + 60), "1 year, 1 day");
    }

    #[test]
    fn test_format_duration_skips_zero_units() {
        // one day plus ninety seconds: hours are zero, minutes still shown
        assert_eq!(format_duration(86_400 + 90), "1 day, 1 minute");
    }

    #[test]
    fn test_format_duration_clamps_negative() {
        assert_eq!(format_duration(-5), "moments");
    }
}
