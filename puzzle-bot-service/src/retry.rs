// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{future::Future, time::Duration};

use rand::Rng;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Exponential backoff with up to half a base delay of random jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let backoff_ms = base_ms.saturating_mul(1_u64 << attempt.saturating_sub(1).min(16));
        let jitter_ms = if base_ms >= 2 {
            rand::rng().random_range(0..=base_ms / 2)
        } else {
            0
        };
        Duration::from_millis(backoff_ms.saturating_add(jitter_ms))
    }
}

/// Marks a failure that another attempt cannot fix (4xx, platform-level rejection).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PermanentFailure(pub String);

pub fn is_permanent(error: &anyhow::Error) -> bool {
    error.downcast_ref::<PermanentFailure>().is_some()
}

/// Run an idempotent external call, retrying transport failures.
pub async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut call: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts && !is_permanent(&error) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = %operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %format!("{error:#}"),
                    "external call failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(error.context(format!("{operation} failed after {attempt} attempt(s)")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_transient(fast_policy(3), "test.call", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                anyhow::bail!("transient failure {n}");
            }
            Ok(n)
        })
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let error = retry_transient(fast_policy(2), "test.call", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow::anyhow!("still down"))
        })
        .await
        .unwrap_err();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        let message = format!("{error:#}");
        assert!(message.contains("test.call failed after 2 attempt(s)"));
        assert!(message.contains("still down"));
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let error = retry_transient(fast_policy(5), "test.call", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(anyhow::Error::new(PermanentFailure(
                "channel_not_found".to_string(),
            )))
        })
        .await
        .unwrap_err();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(is_permanent(&error));
    }

    #[test]
    fn permanent_failure_keeps_its_message_through_context() {
        let error = anyhow::Error::new(PermanentFailure(
            "slack chat.postMessage failed: not_in_channel".to_string(),
        ))
        .context("slack.chat.postMessage failed after 1 attempt(s)");
        assert!(is_permanent(&error));
        assert_eq!(
            format!("{error:#}"),
            "slack.chat.postMessage failed after 1 attempt(s): slack chat.postMessage failed: not_in_channel"
        );
    }

    #[test]
    fn delay_grows_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        let first = policy.delay_for(1);
        let third = policy.delay_for(3);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(450));
        let no_delay = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        };
        assert_eq!(no_delay.delay_for(1), Duration::ZERO);
    }
}
