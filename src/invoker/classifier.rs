//! Invocation error classification and retry backoff.
//!
//! Failures fall into two backoff classes: timeouts, network failures and
//! 5xx-equivalent responses recover on their own often enough to warrant a
//! gentler multiplier, while everything else backs off at the classic
//! exponential rate. Both classes consume the same retry budget; whether
//! 4xx-equivalent failures should retry at all is a product decision this
//! layer does not make.

use std::time::Duration;

use crate::constants::{MAX_RETRY_DELAY_MS, SOFT_BACKOFF_MULTIPLIER, STANDARD_BACKOFF_MULTIPLIER};

use super::InvokeError;

/// Backoff class assigned to a failed invocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Timeout, network or 5xx-equivalent failure: multiplier 1.5 per attempt
    Soft,
    /// Any other failure: multiplier 2.0 per attempt
    Standard,
}

impl RetryClass {
    /// Classify an invocation error.
    pub fn of(error: &InvokeError) -> Self {
        match error {
            InvokeError::Timeout { .. } | InvokeError::Transient { .. } => RetryClass::Soft,
            _ => RetryClass::Standard,
        }
    }

    /// Per-attempt delay multiplier for this class.
    pub fn multiplier(self) -> f64 {
        match self {
            RetryClass::Soft => SOFT_BACKOFF_MULTIPLIER,
            RetryClass::Standard => STANDARD_BACKOFF_MULTIPLIER,
        }
    }
}

/// Delay to wait before the retry that follows failed attempt `attempt`
/// (0-based), capped at [`MAX_RETRY_DELAY_MS`].
pub fn backoff_delay(base: Duration, class: RetryClass, attempt: u32) -> Duration {
    let scaled = base.mul_f64(class.multiplier().powi(attempt as i32));
    scaled.min(Duration::from_millis(MAX_RETRY_DELAY_MS))
}
