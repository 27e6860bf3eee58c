use std::time::Duration;

use async_trait::async_trait;

use super::{AiResponse, AiService};
use crate::errors::AiError;

/// Retry policy for transient AI failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles each retry).
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Retries transient failures of the wrapped service with capped exponential
/// backoff. Fatal failures and the final transient failure are returned as-is.
pub struct RetryingAiService<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: AiService> RetryingAiService<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: AiService> AiService for RetryingAiService<S> {
    async fn ask(&self, prompt: &str, max_output_tokens: u32) -> Result<AiResponse, AiError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.ask(prompt, max_output_tokens).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.policy.backoff_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient AI failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedAi;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(3),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(4), Duration::from_secs(3));
        assert_eq!(policy.backoff_for(40), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let ai = ScriptedAi::new(vec![
            Err(AiError::Transient("503".into())),
            Err(AiError::Transient("529".into())),
            Ok(AiResponse::new("done", 5)),
        ]);
        let service = RetryingAiService::new(ai, fast_policy());
        let response = service.ask("p", 100).await.unwrap();
        assert_eq!(response.text, "done");
        assert_eq!(service.inner().call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let ai = ScriptedAi::with_fallback(Vec::new(), Err(AiError::Transient("503".into())));
        let service = RetryingAiService::new(ai, fast_policy());
        let err = service.ask("p", 100).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(service.inner().call_count(), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let ai = ScriptedAi::new(vec![Err(AiError::Fatal("401".into()))]);
        let service = RetryingAiService::new(ai, fast_policy());
        let err = service.ask("p", 100).await.unwrap_err();
        assert_eq!(err, AiError::Fatal("401".into()));
        assert_eq!(service.inner().call_count(), 1);
    }
}
