//! Bounded retry with exponential backoff for remote-service calls.
//!
//! Transient failures (429, 5xx, transport errors) are retried; anything
//! else is returned to the caller immediately so the domain layer can map
//! the status to its own error kind.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::time::sleep;
use tracing::warn;

/// Retry schedule applied to a single remote call.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before the second attempt; doubles on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; for latency-sensitive callers and tests.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Sends a request, retrying transient failures per `policy`.
///
/// Returns the final response even when its status is an error, so callers
/// can read the body and classify the failure themselves. Only a transport
/// error that persists through every attempt is returned as `Err`. Requests
/// with non-clonable bodies are sent exactly once.
pub async fn send_with_retry(
    builder: RequestBuilder,
    policy: &RetryPolicy,
    label: &str,
) -> Result<Response, reqwest::Error> {
    let attempts = policy.attempts.max(1);
    for attempt in 1..attempts {
        let Some(request) = builder.try_clone() else {
            break;
        };
        match request.send().await {
            Ok(response) if is_transient_status(response.status()) => {
                warn!(
                    label,
                    attempt,
                    status = %response.status(),
                    "transient status from remote service, retrying"
                );
            }
            Ok(response) => return Ok(response),
            Err(err) => {
                warn!(label, attempt, error = %err, "transport error, retrying");
            }
        }
        sleep(policy.delay_for(attempt)).await;
    }
    // Last attempt consumes the original builder.
    builder.send().await
}
