use std::time::Duration;

use tracing::warn;

use crate::provider::{ProviderError, SeriesProvider};
use crate::{Observation, SeriesRequest};

/// Fixed-count retry with a constant pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. 0 is treated as 1.
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// One attempt, no pause.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Fetch `req`, retrying on errors and on empty results.
///
/// After the last attempt the last error is returned, or
/// [`ProviderError::Empty`] when every attempt came back empty.
pub fn fetch_with_retry(
    provider: &dyn SeriesProvider,
    req: &SeriesRequest,
    policy: RetryPolicy,
) -> Result<Vec<Observation>, ProviderError> {
    let attempts = policy.attempts.max(1);
    let mut last_err = ProviderError::Empty {
        series: req.id.clone(),
    };

    for attempt in 1..=attempts {
        match provider.fetch(req) {
            Ok(obs) if !obs.is_empty() => return Ok(obs),
            Ok(_) => {
                last_err = ProviderError::Empty {
                    series: req.id.clone(),
                };
            }
            // Missing data does not appear on retry.
            Err(e @ ProviderError::NotFound { .. }) | Err(e @ ProviderError::Config(_)) => {
                return Err(e);
            }
            Err(e) => last_err = e,
        }

        warn!(
            provider = provider.name(),
            series = %req.id,
            attempt,
            attempts,
            error = %last_err,
            "series fetch attempt failed"
        );

        if attempt < attempts && !policy.backoff.is_zero() {
            std::thread::sleep(policy.backoff);
        }
    }

    Err(last_err)
}
