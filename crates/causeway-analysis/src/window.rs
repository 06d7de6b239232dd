//! Analysis time windows
//!
//! A `TimeWindow` is the half-open interval `[start, end)`. All derived
//! windows (impact before/after, trailing baseline) are built here so the
//! boundary conventions live in one place.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window; `start` must not be after `end`
    #[inline]
    #[must_use]
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start <= end, "window start after end");
        Self { start, end }
    }

    /// The trailing `minutes` ending at `now`
    #[inline]
    #[must_use]
    pub fn last_minutes(now: DateTime<Utc>, minutes: i64) -> Self {
        Self::new(now - Duration::minutes(minutes), now)
    }

    /// The trailing `hours` ending at `now`
    #[inline]
    #[must_use]
    pub fn last_hours(now: DateTime<Utc>, hours: i64) -> Self {
        Self::new(now - Duration::hours(hours), now)
    }

    /// The trailing `days` ending at `now`
    #[inline]
    #[must_use]
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        Self::new(now - Duration::days(days), now)
    }

    /// The `width` interval leading up to `t`: `[t - width, t)`
    #[inline]
    #[must_use]
    pub fn before(t: DateTime<Utc>, width: Duration) -> Self {
        Self::new(t - width, t)
    }

    /// The `width` interval starting at `t`: `[t, t + width)`
    #[inline]
    #[must_use]
    pub fn after(t: DateTime<Utc>, width: Duration) -> Self {
        Self::new(t, t + width)
    }

    /// Trailing `days` ending one day before `now`
    ///
    /// The most recent day is excluded so an in-progress incident does not
    /// pollute its own baseline.
    #[must_use]
    pub fn baseline_window(now: DateTime<Utc>, days: u32) -> Self {
        let end = now - Duration::days(1);
        Self::new(end - Duration::days(i64::from(days)), end)
    }

    /// Window start (inclusive)
    #[inline]
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Window end (exclusive)
    #[inline]
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Window width
    #[inline]
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Window width in whole minutes
    #[inline]
    #[must_use]
    pub fn minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Whether `t` falls inside `[start, end)`
    #[inline]
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn trailing_window() {
        let window = TimeWindow::last_minutes(now(), 15);
        assert_eq!(window.end(), now());
        assert_eq!(window.minutes(), 15);
    }

    #[test]
    fn before_and_after_share_the_boundary() {
        let t = now();
        let before = TimeWindow::before(t, Duration::hours(1));
        let after = TimeWindow::after(t, Duration::hours(1));

        assert_eq!(before.end(), t);
        assert_eq!(after.start(), t);
        // The boundary instant belongs to the after-window only.
        assert!(!before.contains(t));
        assert!(after.contains(t));
    }

    #[test]
    fn end_is_exclusive() {
        let window = TimeWindow::last_minutes(now(), 5);
        assert!(window.contains(window.start()));
        assert!(!window.contains(window.end()));
    }

    #[test]
    fn baseline_window_excludes_most_recent_day() {
        let window = TimeWindow::baseline_window(now(), 7);
        assert_eq!(window.end(), now() - Duration::days(1));
        assert_eq!(window.duration(), Duration::days(7));
    }
}
