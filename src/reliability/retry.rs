use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryStrategy {
    ExponentialBackoff,
    LinearBackoff,
    FixedDelay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
        }
    }
}

/// Delay schedule for re-establishing the one transport connection a
/// session owns. Attempts are counted across a single recovery episode;
/// a successful reconnect resets the schedule.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: RetryConfig,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to sleep before the next attempt, or `None` once the attempt
    /// budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.calculate_delay(self.attempt))
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = match self.config.strategy {
            RetryStrategy::ExponentialBackoff => {
                let multiplier = 2_u64.saturating_pow(attempt.saturating_sub(1));
                Duration::from_millis(
                    (self.config.base_delay.as_millis() as u64).saturating_mul(multiplier),
                )
            }
            RetryStrategy::LinearBackoff => Duration::from_millis(
                (self.config.base_delay.as_millis() as u64).saturating_mul(attempt as u64),
            ),
            RetryStrategy::FixedDelay => self.config.base_delay,
        };

        let capped_delay = std::cmp::min(base_delay, self.config.max_delay);

        if self.config.jitter {
            apply_jitter(capped_delay)
        } else {
            capped_delay
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_factor = rng.random_range(0.5..1.5); // ±50% jitter
    let jittered_millis = (delay.as_millis() as f64 * jitter_factor) as u64;
    Duration::from_millis(jittered_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: RetryStrategy, max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            strategy,
            jitter: false,
        })
    }

    #[test]
    fn exponential_delays_double_until_capped() {
        let mut policy = policy(RetryStrategy::ExponentialBackoff, 10);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(400)));
        // Attempts 4..10 keep doubling but never exceed the cap
        let mut last = Duration::ZERO;
        for _ in 3..10 {
            last = policy.next_delay().unwrap();
        }
        assert_eq!(last, Duration::from_secs(2));
    }

    #[test]
    fn linear_delays_grow_by_base() {
        let mut policy = policy(RetryStrategy::LinearBackoff, 3);
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(300)));
        assert_eq!(policy.next_delay(), None);
    }

    #[test]
    fn exhaustion_reports_none_and_reset_restores_budget() {
        let mut policy = policy(RetryStrategy::FixedDelay, 2);
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.next_delay(), None);
        policy.reset();
        assert!(policy.next_delay().is_some());
    }

    #[test]
    fn jitter_stays_within_half_to_one_and_a_half() {
        let mut policy = ReconnectPolicy::new(RetryConfig {
            max_attempts: 100,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            strategy: RetryStrategy::FixedDelay,
            jitter: true,
        });
        for _ in 0..100 {
            let delay = policy.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(50));
            assert!(delay < Duration::from_millis(150));
        }
    }
}
