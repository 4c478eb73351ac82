//! Reconnect delay policy for the push channel.

use std::time::Duration;

use rand::Rng;

/// How the delay grows between consecutive reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStrategy {
    /// Same delay before every attempt.
    Fixed,
    /// Delay doubles per failed attempt, capped at `max_delay`.
    Exponential,
}

/// Reconnect policy.
///
/// There is no attempt limit: while a connection handle is
/// open, the transport keeps reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Growth strategy.
    pub strategy: ReconnectStrategy,
    /// Delay before the first reconnect.
    pub base_delay: Duration,
    /// Upper bound for exponential growth.
    pub max_delay: Duration,
    /// Randomise each delay into `[delay / 2, delay]`.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(1_500))
    }
}

impl ReconnectPolicy {
    /// Fixed delay, no jitter.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            strategy: ReconnectStrategy::Fixed,
            base_delay: delay,
            max_delay: delay,
            jitter: false,
        }
    }

    /// Exponential growth from `base` up to `max`, with jitter.
    #[must_use]
    pub const fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            strategy: ReconnectStrategy::Exponential,
            base_delay: base,
            max_delay: max,
            jitter: true,
        }
    }

    /// Delay before reconnect attempt number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.strategy {
            ReconnectStrategy::Fixed => self.base_delay,
            ReconnectStrategy::Exponential => {
                let factor = 1_u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
                self.base_delay
                    .checked_mul(factor)
                    .unwrap_or(self.max_delay)
                    .min(self.max_delay.max(self.base_delay))
            }
        };
        if self.jitter && !delay.is_zero() {
            let half = delay / 2;
            let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
            let extra = rand::thread_rng().gen_range(0..=spread);
            half + Duration::from_millis(extra)
        } else {
            delay
        }
    }
}
