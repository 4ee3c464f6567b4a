//! Reconnect policy: exponential backoff with a cap, jitter and a bounded
//! number of attempts.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the client retries after the socket drops unexpectedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Whether to reconnect automatically at all.
    pub enabled: bool,
    /// Delay before the first attempt. Doubles with every attempt.
    pub initial_delay: Duration,
    /// Upper bound for the doubled delay (jitter is added on top).
    pub max_delay: Duration,
    /// Attempts before giving up and staying disconnected.
    pub max_attempts: u32,
    /// Random extra delay (0..=jitter) per attempt so many clients
    /// dropped by the same hub restart don't all dial at once.
    pub jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
            jitter: Duration::from_millis(250),
        }
    }
}

impl ReconnectConfig {
    /// A config that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Backoff::new`]. Rules:
    /// - `initial_delay` of zero becomes 1 ms.
    /// - `max_delay` is raised to at least `initial_delay`.
    pub fn validated(mut self) -> Self {
        if self.initial_delay.is_zero() {
            warn!("reconnect initial_delay is zero, using 1ms");
            self.initial_delay = Duration::from_millis(1);
        }
        if self.max_delay < self.initial_delay {
            warn!(
                initial = ?self.initial_delay,
                max = ?self.max_delay,
                "reconnect max_delay below initial_delay, raising it"
            );
            self.max_delay = self.initial_delay;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Produces the delay before each reconnect attempt.
///
/// One `Backoff` per outage: create it when the connection drops, call
/// [`next_delay`](Self::next_delay) before every attempt, drop it once a
/// reconnect succeeds. The next outage starts from a fresh one.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl Backoff {
    /// Creates a fresh backoff (no attempts made yet).
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config: config.validated(),
            attempt: 0,
        }
    }

    /// Number of attempts handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the delay before the next attempt, or `None` once
    /// `max_attempts` have been used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_attempts {
            return None;
        }
        let delay = self.base_delay(self.attempt) + self.jitter();
        self.attempt += 1;
        Some(delay)
    }

    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    fn base_delay(&self, attempt: u32) -> Duration {
        let max = self.config.max_delay;
        1u32.checked_shl(attempt)
            .and_then(|factor| self.config.initial_delay.checked_mul(factor))
            .map_or(max, |delay| delay.min(max))
    }

    fn jitter(&self) -> Duration {
        if self.config.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_us = u64::try_from(self.config.jitter.as_micros()).unwrap_or(u64::MAX);
        Duration::from_micros(rand::rng().random_range(0..=max_us))
    }
}
