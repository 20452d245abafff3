//! Job types and the retry backoff policy (spec §6.2 — "3-attempt
//! exponential backoff, independent of per-node retry").

use std::time::Duration;

pub use db::models::JobRow as Job;

/// Delay before a failed job becomes eligible for another attempt:
/// `2^attempts` seconds, capped at an hour so a stuck job doesn't starve the
/// worker loop indefinitely.
#[must_use]
pub fn backoff_delay(attempts: i32) -> Duration {
    let secs = 2u64.saturating_pow(attempts.max(0) as u32).min(3600);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(20), Duration::from_secs(3600));
    }
}
