//! Bounded exponential-backoff retry policy for session setup.
//!
//! Pure bookkeeping: the policy only decides *whether* and *after how
//! long* to retry.  The engine owns no timers — it surfaces the delay and
//! the host delivers [`Event::RetryWindowElapsed`](crate::events::Event)
//! when the window passes.

use crate::config::SystemConfig;
use crate::error::FailCause;

/// What to do after a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-attempt after the given delay.
    Retry { delay_ms: u32 },
    /// Stop; surface the failure to the caller.
    GiveUp,
}

/// Per-connect-request retry state.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u8,
    initial_delay_ms: u32,
    multiplier: u32,
    max_delay_ms: u32,
    /// Automatic re-attempts consumed since the last `reset`.
    attempts_used: u8,
}

impl RetryPolicy {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            initial_delay_ms: config.retry_initial_delay_ms,
            multiplier: config.retry_backoff_multiplier.max(1),
            max_delay_ms: config.retry_max_delay_ms,
            attempts_used: 0,
        }
    }

    /// Forget accumulated attempts (fresh connect request, or success).
    pub fn reset(&mut self) {
        self.attempts_used = 0;
    }

    /// Decide the response to a failure with the given cause.
    pub fn next(&mut self, cause: FailCause) -> RetryDecision {
        if cause.is_permanent() || self.attempts_used >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let mut delay = self.initial_delay_ms;
        for _ in 0..self.attempts_used {
            delay = delay.saturating_mul(self.multiplier).min(self.max_delay_ms);
        }
        self.attempts_used += 1;
        RetryDecision::Retry {
            delay_ms: delay.min(self.max_delay_ms),
        }
    }

    pub fn attempts_used(&self) -> u8 {
        self.attempts_used
    }
}
