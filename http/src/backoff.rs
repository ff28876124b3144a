use std::time::{Duration, Instant};

use common::random::{clocked_rng, Rng, RngExt};

#[derive(Clone)]
pub struct ExponentialBackoffOptions {
    /// Initial wait duration, measured relative to the completion time of
    /// the last attempt.
    pub base_duration: Duration,
    /// Maximum random noise added to each retry.
    pub jitter_duration: Duration,
    /// Maximum wait duration before retrying (excludes jitter).
    pub max_duration: Duration,
    /// If attempts succeed for at least this long, the backoff resets.
    pub cooldown_duration: Duration,
    /// 0 means unlimited; 1 means a single attempt with no retries.
    pub max_num_attempts: usize,
}

pub enum ExponentialBackoffResult {
    Start,
    StartAfter(Duration),
    Stop,
}

pub struct ExponentialBackoff {
    options: ExponentialBackoffOptions,
    current_backoff: Duration,
    successful_since: Option<Instant>,
    last_completion: Option<Instant>,
    attempt_count: usize,
    attempt_pending: bool,
    rng: Box<dyn Rng + Send + Sync>,
}

impl ExponentialBackoff {
    pub fn new(options: ExponentialBackoffOptions) -> Self {
        Self {
            options,
            current_backoff: Duration::ZERO,
            successful_since: None,
            last_completion: None,
            attempt_pending: false,
            attempt_count: 0,
            rng: Box::new(clocked_rng()),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.options.clone());
    }

    /// Signals that a new attempt is about to start. Returns how long the
    /// caller should wait first, or `Stop` once `max_num_attempts` has
    /// been exhausted.
    pub fn start_attempt(&mut self) -> ExponentialBackoffResult {
        if self.attempt_pending {
            self.end_attempt(false);
        }

        if self.options.max_num_attempts > 0 && self.attempt_count >= self.options.max_num_attempts {
            return ExponentialBackoffResult::Stop;
        }

        self.attempt_pending = true;

        if self.current_backoff.is_zero() {
            return ExponentialBackoffResult::Start;
        }

        let jitter_micros = self.options.jitter_duration.as_micros() as u64;
        let wait_time = self.current_backoff + Duration::from_micros(self.rng.between(0, jitter_micros));

        let now = Instant::now();
        if let Some(last_completion) = self.last_completion {
            let elapsed = now.duration_since(last_completion);
            if elapsed >= wait_time {
                return ExponentialBackoffResult::Start;
            }
            return ExponentialBackoffResult::StartAfter(wait_time - elapsed);
        }

        ExponentialBackoffResult::StartAfter(wait_time)
    }

    pub fn end_attempt(&mut self, successful: bool) {
        let now = Instant::now();
        self.attempt_pending = false;
        self.attempt_count += 1;
        self.last_completion = Some(now);

        if successful {
            let successful_since = *self.successful_since.get_or_insert(now);
            if now - successful_since >= self.options.cooldown_duration {
                self.current_backoff = Duration::ZERO;
            }
        } else {
            self.current_backoff = if self.current_backoff.is_zero() {
                self.options.base_duration
            } else {
                std::cmp::min(2 * self.current_backoff, self.options.max_duration)
            };
            self.successful_since = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ExponentialBackoffOptions {
        ExponentialBackoffOptions {
            base_duration: Duration::from_millis(10),
            jitter_duration: Duration::from_millis(1),
            max_duration: Duration::from_millis(100),
            cooldown_duration: Duration::from_secs(1),
            max_num_attempts: 3,
        }
    }

    #[test]
    fn first_attempt_starts_immediately() {
        let mut backoff = ExponentialBackoff::new(opts());
        assert!(matches!(backoff.start_attempt(), ExponentialBackoffResult::Start));
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut backoff = ExponentialBackoff::new(opts());
        for _ in 0..3 {
            backoff.start_attempt();
            backoff.end_attempt(false);
        }
        assert!(matches!(backoff.start_attempt(), ExponentialBackoffResult::Stop));
    }

    #[test]
    fn backoff_doubles_on_repeated_failure() {
        let mut backoff = ExponentialBackoff::new(ExponentialBackoffOptions {
            max_num_attempts: 0,
            ..opts()
        });
        backoff.start_attempt();
        backoff.end_attempt(false);
        assert_eq!(backoff.current_backoff, Duration::from_millis(10));
        backoff.start_attempt();
        backoff.end_attempt(false);
        assert_eq!(backoff.current_backoff, Duration::from_millis(20));
    }

    #[test]
    fn success_resets_backoff_after_cooldown() {
        let mut backoff = ExponentialBackoff::new(ExponentialBackoffOptions {
            cooldown_duration: Duration::ZERO,
            max_num_attempts: 0,
            ..opts()
        });
        backoff.start_attempt();
        backoff.end_attempt(false);
        assert!(!backoff.current_backoff.is_zero());
        backoff.start_attempt();
        backoff.end_attempt(true);
        assert!(backoff.current_backoff.is_zero());
    }
}
