//! Reconnect delay policy.
use std::time::Duration;

use clap::ValueEnum;
use strum_macros::{Display, EnumString};

/// Curve used to space out reconnect attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, ValueEnum)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackoffPolicy {
    /// `attempt × base`.
    #[default]
    Linear,
    /// `base × 2^(attempt − 1)`.
    Exponential,
}

impl BackoffPolicy {
    /// Delay before the 1-based reconnect `attempt`, capped at `max`.
    pub fn delay(self, attempt: u32, base: Duration, max: Duration) -> Duration {
        let delay = match self {
            BackoffPolicy::Linear => base.saturating_mul(attempt),
            BackoffPolicy::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor)
            }
        };
        delay.min(max)
    }
}
