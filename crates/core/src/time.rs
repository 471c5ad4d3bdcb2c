use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns a copy of this clock advanced by `delta`.
    #[must_use]
    pub fn advanced(mut self, delta: Duration) -> Self {
        self.advance(delta);
        self
    }
}

/// Whole seconds elapsed between `since` and `now`, rounded down.
///
/// A `now` earlier than `since` counts as zero elapsed time.
#[must_use]
pub fn elapsed_whole_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (now - since).num_milliseconds();
    u64::try_from(millis.div_euclid(1000)).unwrap_or(0)
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_rounds_down_to_whole_seconds() {
        let start = fixed_now();
        assert_eq!(elapsed_whole_seconds(start, start), 0);
        assert_eq!(
            elapsed_whole_seconds(start, start + Duration::milliseconds(1999)),
            1
        );
        assert_eq!(elapsed_whole_seconds(start, start + Duration::seconds(75)), 75);
    }

    #[test]
    fn elapsed_before_start_is_zero() {
        let start = fixed_now();
        assert_eq!(elapsed_whole_seconds(start, start - Duration::seconds(5)), 0);
    }

    #[test]
    fn advanced_only_moves_fixed_clocks() {
        let clock = fixed_clock().advanced(Duration::seconds(30));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(30));

        let mut real = Clock::Default;
        real.advance(Duration::days(1));
        assert!(matches!(real, Clock::Default));
    }
}
