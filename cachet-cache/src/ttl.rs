//! Common TTL presets.
//!
//! ```
//! use cachet_cache::ttl;
//! use std::time::Duration;
//!
//! assert_eq!(ttl::QUARTER_HOUR, Duration::from_secs(900));
//! assert_eq!(ttl::INFINITE, None);
//! ```

use std::time::Duration;

/// Never expire.
pub const INFINITE: Option<Duration> = None;
/// One minute.
pub const MINUTE: Duration = Duration::from_secs(60);
/// Five minutes.
pub const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);
/// Fifteen minutes.
pub const QUARTER_HOUR: Duration = Duration::from_secs(15 * 60);
/// Thirty minutes.
pub const HALF_HOUR: Duration = Duration::from_secs(30 * 60);
/// One hour.
pub const HOUR: Duration = Duration::from_secs(60 * 60);
/// One day.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);
/// Seven days.
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Thirty days.
pub const MONTH: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// 180 days.
pub const HALF_YEAR: Duration = Duration::from_secs(180 * 24 * 60 * 60);
/// 365 days.
pub const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Normalise a caller TTL: `None` and zero both mean "no expiry".
pub fn effective(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|d| !d.is_zero())
}

/// Longest TTL stored as a deadline. Anything longer is kept without expiry.
pub const MAX_EXPIRY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// TTL in whole seconds, rounding sub-second remainders up so a short TTL
/// never turns into "no expiry".
pub fn whole_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

/// Effective TTL in whole seconds for backends that store a relative or
/// absolute second count. `None` means no expiry, also for TTLs past
/// [`MAX_EXPIRY`].
pub fn expiry_seconds(ttl: Option<Duration>) -> Option<u64> {
    effective(ttl)
        .filter(|ttl| *ttl <= MAX_EXPIRY)
        .map(whole_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(HOUR.as_secs(), 3600);
        assert_eq!(MONTH.as_secs(), 2_592_000);
        assert_eq!(HALF_YEAR.as_secs(), 15_552_000);
        assert_eq!(YEAR.as_secs(), 31_536_000);
    }

    #[test]
    fn test_effective() {
        assert_eq!(effective(None), None);
        assert_eq!(effective(Some(Duration::ZERO)), None);
        assert_eq!(effective(Some(MINUTE)), Some(MINUTE));
    }

    #[test]
    fn test_whole_seconds() {
        assert_eq!(whole_seconds(Duration::from_secs(60)), 60);
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(whole_seconds(Duration::from_millis(1)), 1);
        assert_eq!(whole_seconds(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_expiry_seconds() {
        assert_eq!(expiry_seconds(None), None);
        assert_eq!(expiry_seconds(Some(Duration::ZERO)), None);
        assert_eq!(expiry_seconds(Some(Duration::from_millis(200))), Some(1));
        assert_eq!(expiry_seconds(Some(YEAR)), Some(31_536_000));
        assert_eq!(expiry_seconds(Some(MAX_EXPIRY)), Some(MAX_EXPIRY.as_secs()));
        assert_eq!(expiry_seconds(Some(MAX_EXPIRY + Duration::from_secs(1))), None);
        assert_eq!(expiry_seconds(Some(Duration::MAX)), None);
        assert_eq!(expiry_seconds(Some(Duration::from_secs(u64::MAX))), None);
    }
}
