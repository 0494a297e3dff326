//! Exponential-backoff retry wrapper for LLM gateways.
//!
//! Transient provider errors (network, rate limiting, 5xx) are retried with
//! exponentially growing delays up to a configured attempt count;
//! non-retryable errors (auth, malformed request) surface immediately.
//! Classification comes from [`GatewayError::is_retryable`], so any inner
//! gateway gets the same policy.

use async_trait::async_trait;
use harbor_application::ports::llm_gateway::{GatewayError, LlmGateway};
use harbor_domain::Turn;
use std::time::Duration;
use tracing::warn;

/// Backoff policy: `base_delay * 2^attempt` between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Gateway wrapper that retries transient failures.
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G> RetryingGateway<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<G: LlmGateway> LlmGateway for RetryingGateway<G> {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
    ) -> Result<String, GatewayError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.complete(system_prompt, turns).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient provider error; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FlakyGateway {
        responses: Mutex<VecDeque<Result<String, GatewayError>>>,
        calls: Mutex<u32>,
    }

    impl FlakyGateway {
        fn new(responses: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmGateway for FlakyGateway {
        async fn complete(
            &self,
            _system_prompt: Option<&str>,
            _turns: &[Turn],
        ) -> Result<String, GatewayError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::ServerError("exhausted".into())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_until_success() {
        let gateway = RetryingGateway::new(
            FlakyGateway::new(vec![
                Err(GatewayError::Network("reset".into())),
                Err(GatewayError::RateLimited("429".into())),
                Ok("recovered".into()),
            ]),
            RetryPolicy::default(),
        );

        let result = gateway.complete(None, &[]).await.unwrap();
        assert_eq!(result, "recovered");
        assert_eq!(gateway.inner.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_surfaces_immediately() {
        let gateway = RetryingGateway::new(
            FlakyGateway::new(vec![Err(GatewayError::AuthFailed("bad key".into()))]),
            RetryPolicy::default(),
        );

        let err = gateway.complete(None, &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::AuthFailed(_)));
        assert_eq!(gateway.inner.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let gateway = RetryingGateway::new(
            FlakyGateway::new(vec![
                Err(GatewayError::ServerError("503".into())),
                Err(GatewayError::ServerError("503".into())),
                Err(GatewayError::ServerError("503".into())),
                Ok("never reached".into()),
            ]),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
            },
        );

        let err = gateway.complete(None, &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::ServerError(_)));
        assert_eq!(gateway.inner.call_count(), 3);
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
