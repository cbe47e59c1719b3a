// This file is part of the terraform-provider-citrix project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::future::Future;
use std::time::Duration;

use rand::{thread_rng, Rng};
use tracing::{debug, warn};

use super::error::ApiError;

/// Bounded exponential backoff for idempotent reads
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`
    ///
    /// `retry_after` comes from a `Retry-After` header and is still capped by `max_delay`.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(retry_after) = retry_after {
            return retry_after.min(self.max_delay);
        }
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        let jitter_ms = (self.base_delay.as_millis() as u64 / 2).max(1);
        let jitter = Duration::from_millis(thread_rng().gen_range(0..jitter_ms));
        (exponential + jitter).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently or the attempts are exhausted
///
/// `operation` returns the error along with an optional server-provided retry delay.
/// The last error is returned unchanged when every attempt failed.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut operation: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, (ApiError, Option<Duration>)>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err((err, retry_after)) => {
                attempt += 1;
                if !err.is_transient() || attempt >= max_attempts {
                    return Err(err);
                }
                let delay = policy.delay(attempt - 1, retry_after);
                warn!(
                    attempt,
                    max_attempts,
                    transaction_id = err.transaction_id(),
                    "{} failed transiently, retrying in {:?}: {}",
                    what,
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                debug!(attempt = attempt + 1, "retrying {}", what);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn status(status: u16) -> ApiError {
        ApiError::Status {
            status,
            transaction_id: "tx".into(),
            message: "boom".into(),
        }
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy::default();
        assert!(policy.delay(30, None) <= policy.max_delay);
        assert_eq!(
            policy.delay(0, Some(Duration::from_secs(120))),
            policy.max_delay
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = execute_with_retry(&RetryPolicy::default(), "read", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err((status(503), None))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&RetryPolicy::default(), "read", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err((status(502), None)) }
        })
        .await;
        assert_eq!(result, Err(status(502)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = execute_with_retry(&RetryPolicy::default(), "read", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err((status(404), None)) }
        })
        .await;
        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
