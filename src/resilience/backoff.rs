//! Trip backoff policy for circuit breakers.

use std::time::Duration;

/// Cooldown for a breaker that has tripped `trips` times since it last closed.
///
/// Returns `min(max, initial * multiplier^trips)`. The first trip (`trips == 0`)
/// uses `initial`. Non-finite or overflowing products saturate at `max`.
pub fn trip_backoff(trips: u32, initial: Duration, multiplier: f64, max: Duration) -> Duration {
    let exponent = i32::try_from(trips).unwrap_or(i32::MAX);
    let secs = initial.as_secs_f64() * multiplier.powi(exponent);

    if !secs.is_finite() || secs >= max.as_secs_f64() {
        return max;
    }
    Duration::try_from_secs_f64(secs).map_or(max, |backoff| backoff.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INITIAL: Duration = Duration::from_secs(30);
    const MAX: Duration = Duration::from_secs(120);

    #[test]
    fn test_first_trip_uses_initial() {
        assert_eq!(trip_backoff(0, INITIAL, 2.0, MAX), INITIAL);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(trip_backoff(1, INITIAL, 2.0, MAX), Duration::from_secs(60));
        assert_eq!(trip_backoff(2, INITIAL, 2.0, MAX), MAX);
        assert_eq!(trip_backoff(3, INITIAL, 2.0, MAX), MAX);
    }

    #[test]
    fn test_huge_trip_count_saturates() {
        assert_eq!(trip_backoff(u32::MAX, INITIAL, 2.0, MAX), MAX);
    }

    #[test]
    fn test_unit_multiplier_is_constant() {
        assert_eq!(trip_backoff(7, INITIAL, 1.0, MAX), INITIAL);
    }
}
