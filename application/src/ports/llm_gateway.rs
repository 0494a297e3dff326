//! LLM Gateway port
//!
//! Defines the interface for requesting chat completions from an LLM
//! provider. Implementations (adapters) live in the infrastructure layer;
//! the orchestrator never sees a concrete backend.

use async_trait::async_trait;
use harbor_domain::Turn;
use thiserror::Error;

/// Errors that can occur during gateway operations.
///
/// Retryability drives the gateway's backoff policy: transient failures
/// (network, rate limiting, server errors) may be retried; everything else
/// surfaces immediately.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider server error: {0}")]
    ServerError(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Network(_) | GatewayError::RateLimited(_) | GatewayError::ServerError(_)
        )
    }
}

/// Gateway for LLM completion requests.
///
/// `complete` is blocking from the caller's perspective and must not hold
/// any lock on the tool registry or a session transcript while in flight.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Request a completion for the given transcript.
    ///
    /// `system_prompt` carries the tool catalog and call conventions;
    /// `turns` is the full conversation so far, in append order.
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        turns: &[Turn],
    ) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::Network("reset".into()).is_retryable());
        assert!(GatewayError::RateLimited("429".into()).is_retryable());
        assert!(GatewayError::ServerError("503".into()).is_retryable());

        assert!(!GatewayError::AuthFailed("401".into()).is_retryable());
        assert!(!GatewayError::BadRequest("400".into()).is_retryable());
        assert!(!GatewayError::MalformedResponse("no choices".into()).is_retryable());
        assert!(!GatewayError::Timeout.is_retryable());
        assert!(!GatewayError::Cancelled.is_retryable());
    }
}
