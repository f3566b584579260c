//! Retry policy: decides backoff delays.

use std::time::Duration;

use rand::Rng;

use crate::settings::RetrySettings;

/// Retry policy for failed tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.base_delay_ms),
            multiplier: settings.multiplier,
            max_delay: Duration::from_secs(settings.max_delay_secs),
            jitter: settings.jitter,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Calculate delay for the next retry based on attempt number.
    ///
    /// `attempts` is the number of attempts already made (1-indexed).
    /// delay = base_delay * multiplier^(attempts - 1), capped at `max_delay`.
    ///
    /// Example with base_delay=2s, multiplier=2.0, no jitter:
    /// - attempt 1 (first failure): 2s
    /// - attempt 2: 4s
    /// - attempt 3: 8s
    pub fn next_delay(&self, attempts: u32) -> Duration {
        self.next_delay_with(attempts, &mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng + ?Sized>(&self, attempts: u32, rng: &mut R) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = Duration::try_from_secs_f64(delay_secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.jitter && !capped.is_zero() {
            capped.mul_f64(rng.gen_range(0.5..=1.0))
        } else {
            capped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn default_policy_has_reasonable_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.max_delay, Duration::from_secs(3600));
    }

    #[rstest]
    #[case(0, 2)]
    #[case(1, 2)]
    #[case(2, 4)]
    #[case(3, 8)]
    #[case(5, 32)]
    fn exponential_backoff(#[case] attempts: u32, #[case] secs: u64) {
        assert_eq!(no_jitter().next_delay(attempts), Duration::from_secs(secs));
    }

    #[test]
    fn delays_are_capped() {
        let policy = no_jitter();
        assert_eq!(policy.next_delay(12), Duration::from_secs(3600));
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_secs(3600));
    }

    #[test]
    fn jitter_stays_within_half_to_full_delay() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for attempts in 1..=8 {
            let full = no_jitter().next_delay(attempts);
            let jittered = policy.next_delay_with(attempts, &mut rng);
            assert!(jittered <= full);
            assert!(jittered >= full / 2);
        }
    }

    #[test]
    fn immediate_policy_never_waits() {
        assert_eq!(RetryPolicy::immediate().next_delay(10), Duration::ZERO);
    }
}
