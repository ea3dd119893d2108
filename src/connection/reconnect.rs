//! Reconnect Policy
//!
//! Pure backoff computation: exponential growth capped at a maximum, with
//! random jitter so a fleet of clients does not reconnect in lockstep.
//! The manager owns scheduling; this type only answers "how long, if at all".

use rand::Rng;
use std::time::Duration;

use crate::config::ReconnectConfig;

/// Jitter applied around the computed delay (±20%)
const JITTER_FACTOR: f64 = 0.2;

/// Computes reconnection delays for consecutive failed attempts
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy from configuration
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            max_attempts: config.max_attempts,
        }
    }

    /// Delay before retry number `attempt` (0-based), or `None` to give up
    ///
    /// `None` signals that attempts are exhausted and the manager must move
    /// to terminal `Closed` instead of scheduling another timer.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let jitter = rand::thread_rng().gen_range(-JITTER_FACTOR..=JITTER_FACTOR);
        let jittered = self.expected_delay_ms(attempt) as f64 * (1.0 + jitter);
        Some(Duration::from_millis(jittered.max(0.0) as u64))
    }

    /// Delay without jitter: `min(base * 2^attempt, max)`
    pub fn expected_delay_ms(&self, attempt: u32) -> u64 {
        let exp = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        exp.min(self.max_delay_ms)
    }

    /// Configured attempt bound
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
