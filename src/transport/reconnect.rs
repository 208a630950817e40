//! Reconnection backoff policy.
//!
//! The delay starts at `delay` and doubles after every failed attempt,
//! capped at `max_delay`. `max_attempts = None` retries forever.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default first reconnect delay.
const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Default reconnect delay cap.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Reconnection parameters handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect after a lost or failed session.
    pub enabled: bool,
    /// Delay before the first reconnect attempt.
    pub delay: Duration,
    /// Upper bound for the exponential delay.
    pub max_delay: Duration,
    /// Maximum consecutive attempts, `None` for unlimited.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: DEFAULT_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// A policy that never reconnects.
    #[inline]
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the first reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the delay cap.
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Limits the number of consecutive attempts.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Returns the delay before reconnect attempt `attempt` (1-based),
    /// or `None` if no further attempt is allowed.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled || attempt == 0 {
            return None;
        }
        if let Some(max) = self.max_attempts
            && attempt > max
        {
            return None;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(
            self.delay
                .checked_mul(factor)
                .unwrap_or(self.max_delay)
                .min(self.max_delay),
        )
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `max_delay` is below `delay`.
    pub fn validate(&self) -> Result<()> {
        if self.max_delay < self.delay {
            return Err(Error::config(format!(
                "Reconnection max delay ({}ms) must not be below delay ({}ms)",
                self.max_delay.as_millis(),
                self.delay.as_millis()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
